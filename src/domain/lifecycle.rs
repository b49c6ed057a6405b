//! Order lifecycle state machine for a single paper-trading account.
//!
//! ```text
//!   submit_order      complete_trade      submit_sell       complete_sell
//! Flat ──────► BuyPending ──────► Holding ──────► SellPending ──────► Flat
//! ```
//!
//! Orders do not fill on submission. A completion call only goes through
//! once more than [`LifecycleSettings::execution_delay`] has elapsed since
//! the order was placed; before that it returns [`Declined::StillPending`]
//! and the caller is expected to poll again on a later tick.
//!
//! Every transition works on a copy of the state and ledger and ends with a
//! single [`commit`](OrderLifecycle::commit). The copy only replaces the live
//! account once the snapshot is durably saved, so a failed save leaves the
//! in-memory account at its last committed version.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::error::{Declined, PaperError};
use super::ledger::{EntryId, Ledger, LedgerUpdate};
use super::position::{Holding, PositionState};
use super::snapshot::Snapshot;
use crate::ports::clock_port::Clock;
use crate::ports::price_port::PriceOracle;
use crate::ports::profile_port::ProfileStore;

pub const DEFAULT_EXECUTION_DELAY_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleSettings {
    pub execution_delay: Duration,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        LifecycleSettings {
            execution_delay: Duration::minutes(DEFAULT_EXECUTION_DELAY_MINUTES),
        }
    }
}

/// Result of a lifecycle call that did not hit a hard failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Declined(Declined),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn declined(&self) -> Option<&Declined> {
        match self {
            Outcome::Done(_) => None,
            Outcome::Declined(reason) => Some(reason),
        }
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Declined(_) => None,
        }
    }
}

pub type Transition<T> = Result<Outcome<T>, PaperError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Flat,
    BuyPending,
    Holding,
    SellPending,
}

/// A completed buy.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub entry_id: EntryId,
    pub ticker: String,
    pub price: Decimal,
    pub shares: Decimal,
    pub amount: Decimal,
    pub at: DateTime<Utc>,
}

/// A completed sell.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub entry_id: EntryId,
    pub ticker: String,
    pub price: Decimal,
    pub proceeds: Decimal,
    pub profit: Decimal,
    pub at: DateTime<Utc>,
}

pub struct OrderLifecycle<'a> {
    profile: String,
    version: u64,
    state: PositionState,
    ledger: Ledger,
    settings: LifecycleSettings,
    store: &'a dyn ProfileStore,
    prices: &'a dyn PriceOracle,
    clock: &'a dyn Clock,
}

impl<'a> OrderLifecycle<'a> {
    /// Resume the account from `store`, or start a fresh zero-cash account if
    /// the profile has never been saved.
    pub fn open(
        store: &'a dyn ProfileStore,
        prices: &'a dyn PriceOracle,
        clock: &'a dyn Clock,
        settings: LifecycleSettings,
    ) -> Result<Self, PaperError> {
        let snapshot = match store.load() {
            Ok(snapshot) => {
                snapshot.validate()?;
                debug!(
                    profile = %snapshot.profile,
                    version = snapshot.version,
                    entries = snapshot.ledger.len(),
                    "profile loaded"
                );
                snapshot
            }
            Err(PaperError::ProfileNotFound { profile }) => {
                info!(profile = %profile, "no saved profile, starting fresh");
                Snapshot::fresh(&profile)
            }
            Err(e) => return Err(e),
        };
        Ok(Self::from_snapshot(snapshot, store, prices, clock, settings))
    }

    pub fn from_snapshot(
        snapshot: Snapshot,
        store: &'a dyn ProfileStore,
        prices: &'a dyn PriceOracle,
        clock: &'a dyn Clock,
        settings: LifecycleSettings,
    ) -> Self {
        OrderLifecycle {
            profile: snapshot.profile,
            version: snapshot.version,
            state: snapshot.state,
            ledger: snapshot.ledger,
            settings,
            store,
            prices,
            clock,
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    pub fn stage(&self) -> Stage {
        if self.state.pending_sell {
            Stage::SellPending
        } else if self.state.pending_purchase {
            Stage::BuyPending
        } else if self.state.holding.is_some() {
            Stage::Holding
        } else {
            Stage::Flat
        }
    }

    /// Add cash to the account.
    pub fn deposit(&mut self, amount: Decimal) -> Transition<Decimal> {
        if amount <= Decimal::ZERO {
            return Ok(Outcome::Declined(Declined::InvalidOrder {
                reason: format!("deposit must be positive, got {}", amount),
            }));
        }
        let Some(cash) = self.state.cash.checked_add(amount) else {
            return Ok(Outcome::Declined(Declined::InvalidOrder {
                reason: format!("deposit of {} overflows the cash balance", amount),
            }));
        };
        let mut state = self.state.clone();
        state.cash = cash;
        self.commit(state, self.ledger.clone())?;
        info!(profile = %self.profile, amount = %amount, cash = %self.state.cash, "cash deposited");
        Ok(Outcome::Done(self.state.cash))
    }

    /// Place a buy order for `amount` of `ticker`. Cash is only debited when
    /// the order completes.
    pub fn submit_order(&mut self, ticker: &str, amount: Decimal) -> Transition<EntryId> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Ok(Outcome::Declined(Declined::InvalidOrder {
                reason: "ticker is empty".into(),
            }));
        }
        if amount <= Decimal::ZERO {
            return Ok(Outcome::Declined(Declined::InvalidOrder {
                reason: format!("amount must be positive, got {}", amount),
            }));
        }
        if self.state.pending_purchase {
            return Ok(Outcome::Declined(Declined::OrderPending));
        }
        if self.ledger.find_open().is_some() {
            return Ok(Outcome::Declined(Declined::PositionOpen));
        }
        if self.state.cash < amount {
            let reason = Declined::InsufficientFunds {
                required: amount,
                available: self.state.cash,
            };
            info!(profile = %self.profile, ticker = %ticker, "{}", reason);
            self.commit(self.state.clone(), self.ledger.clone())?;
            return Ok(Outcome::Declined(reason));
        }

        let now = self.clock.now();
        let mut ledger = self.ledger.clone();
        let id = ledger.append(&ticker, amount, now)?;
        let mut state = self.state.clone();
        state.pending_purchase = true;
        self.commit(state, ledger)?;

        info!(
            profile = %self.profile,
            entry = %id,
            ticker = %ticker,
            amount = %amount,
            "buy order submitted"
        );
        Ok(Outcome::Done(id))
    }

    /// Fill the pending buy once the execution delay has passed.
    pub fn complete_trade(&mut self) -> Transition<Fill> {
        if !self.state.pending_purchase {
            return Ok(Outcome::Declined(Declined::NoPendingOrder));
        }
        let Some(entry) = self.ledger.find_open_buy().and_then(|id| self.ledger.get(id)) else {
            return Ok(Outcome::Declined(Declined::NoPendingOrder));
        };
        let (id, ticker, amount) = (entry.id, entry.ticker.clone(), entry.buy_invested_amount);

        let now = self.clock.now();
        if let Some(remaining) = self.remaining(entry.buy_submission_time, now) {
            debug!(entry = %id, remaining_secs = remaining.num_seconds(), "buy still pending");
            return Ok(Outcome::Declined(Declined::StillPending { remaining }));
        }
        let price = match self.quote(&ticker) {
            Ok(price) => price,
            Err(reason) => return Ok(Outcome::Declined(reason)),
        };

        let (Some(shares), Some(cash)) = (
            amount.checked_div(price),
            self.state.cash.checked_sub(amount),
        ) else {
            return Ok(Outcome::Declined(unusable_price(&ticker, price)));
        };
        let mut ledger = self.ledger.clone();
        ledger.update(
            id,
            LedgerUpdate::BuyCompleted {
                at: now,
                price,
                shares,
            },
        )?;
        let mut state = self.state.clone();
        state.cash = cash;
        state.invested_capital = amount;
        state.pending_purchase = false;
        state.holding = Some(Holding {
            entry_id: id,
            ticker: ticker.clone(),
            purchase_price: price,
            shares,
            percent_change: None,
        });
        self.commit(state, ledger)?;

        info!(
            profile = %self.profile,
            entry = %id,
            ticker = %ticker,
            price = %price,
            shares = %shares,
            "buy completed"
        );
        Ok(Outcome::Done(Fill {
            entry_id: id,
            ticker,
            price,
            shares,
            amount,
            at: now,
        }))
    }

    /// Place a sell order for the whole open position.
    pub fn submit_sell(&mut self) -> Transition<EntryId> {
        if self.state.pending_sell {
            return Ok(Outcome::Declined(Declined::OrderPending));
        }
        let Some(id) = self.ledger.find_holding() else {
            return Ok(Outcome::Declined(Declined::NoOpenPosition));
        };
        if self.state.holding.is_none() {
            return Ok(Outcome::Declined(Declined::NoOpenPosition));
        }

        let now = self.clock.now();
        let mut ledger = self.ledger.clone();
        ledger.update(id, LedgerUpdate::SellSubmitted { at: now })?;
        let mut state = self.state.clone();
        state.pending_sell = true;
        self.commit(state, ledger)?;

        info!(profile = %self.profile, entry = %id, "sell order submitted");
        Ok(Outcome::Done(id))
    }

    /// Settle the pending sell once the execution delay has passed.
    pub fn complete_sell(&mut self) -> Transition<Settlement> {
        if !self.state.pending_sell {
            return Ok(Outcome::Declined(Declined::NoOpenPosition));
        }
        let Some(entry) = self.ledger.find_open_sell().and_then(|id| self.ledger.get(id)) else {
            return Ok(Outcome::Declined(Declined::NoOpenPosition));
        };
        let (id, ticker, amount) = (entry.id, entry.ticker.clone(), entry.buy_invested_amount);
        let (Some(ordered_at), Some(shares)) = (entry.sell_order_time, entry.shares_holding) else {
            return Err(PaperError::Inconsistent {
                reason: format!("entry {} is pending sell without shares or order time", id),
            });
        };

        let now = self.clock.now();
        if let Some(remaining) = self.remaining(ordered_at, now) {
            debug!(entry = %id, remaining_secs = remaining.num_seconds(), "sell still pending");
            return Ok(Outcome::Declined(Declined::StillPending { remaining }));
        }
        let price = match self.quote(&ticker) {
            Ok(price) => price,
            Err(reason) => return Ok(Outcome::Declined(reason)),
        };

        let settled = price.checked_mul(shares).and_then(|proceeds| {
            let profit = proceeds.checked_sub(amount)?;
            let cash = self.state.cash.checked_add(proceeds)?;
            let gains = self.state.capital_gains.checked_add(profit)?;
            Some((proceeds, profit, cash, gains))
        });
        let Some((proceeds, profit, cash, gains)) = settled else {
            return Ok(Outcome::Declined(unusable_price(&ticker, price)));
        };
        let mut ledger = self.ledger.clone();
        ledger.update(id, LedgerUpdate::SellCompleted { at: now, profit })?;
        let mut state = self.state.clone();
        state.cash = cash;
        state.capital_gains = gains;
        state.pending_sell = false;
        state.clear_holding();
        self.commit(state, ledger)?;

        info!(
            profile = %self.profile,
            entry = %id,
            ticker = %ticker,
            price = %price,
            profit = %profit,
            "sell completed"
        );
        Ok(Outcome::Done(Settlement {
            entry_id: id,
            ticker,
            price,
            proceeds,
            profit,
            at: now,
        }))
    }

    /// Refresh the unrealized percent change of the open position.
    pub fn recompute_unrealized_change(&mut self) -> Transition<Decimal> {
        let Some(holding) = self.state.holding.as_ref() else {
            return Ok(Outcome::Declined(Declined::NoOpenPosition));
        };
        let price = match self.quote(&holding.ticker) {
            Ok(price) => price,
            Err(reason) => return Ok(Outcome::Declined(reason)),
        };
        let Some(pct) = holding.percent_change_at(price) else {
            return Ok(Outcome::Declined(unusable_price(&holding.ticker, price)));
        };

        let mut state = self.state.clone();
        if let Some(h) = state.holding.as_mut() {
            h.percent_change = Some(pct);
        }
        self.commit(state, self.ledger.clone())?;

        debug!(profile = %self.profile, price = %price, pct = %pct, "unrealized change updated");
        Ok(Outcome::Done(pct))
    }

    /// Persist `state` and `ledger` as the next version, then adopt them.
    fn commit(&mut self, state: PositionState, ledger: Ledger) -> Result<(), PaperError> {
        let snapshot = Snapshot {
            version: self.version + 1,
            profile: self.profile.clone(),
            saved_at: Some(self.clock.now()),
            state,
            ledger,
        };
        self.store.save(&snapshot)?;

        self.version = snapshot.version;
        self.state = snapshot.state;
        self.ledger = snapshot.ledger;
        Ok(())
    }

    /// Time left before an order placed at `since` may complete, or `None`
    /// once strictly more than the execution delay has elapsed.
    fn remaining(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        let elapsed = now - since;
        if elapsed > self.settings.execution_delay {
            None
        } else {
            Some(self.settings.execution_delay - elapsed)
        }
    }

    fn quote(&self, ticker: &str) -> Result<Decimal, Declined> {
        let unavailable = |reason: String| {
            warn!(ticker = %ticker, reason = %reason, "price unavailable");
            Declined::PriceUnavailable {
                ticker: ticker.to_string(),
                reason,
            }
        };
        match self.prices.current_price(ticker) {
            Ok(price) if price > Decimal::ZERO => Ok(price),
            Ok(price) => Err(unavailable(format!("non-positive price {}", price))),
            Err(e) => Err(unavailable(e.to_string())),
        }
    }
}

/// A quote that is valid on its own but overflows the account arithmetic.
fn unusable_price(ticker: &str, price: Decimal) -> Declined {
    warn!(ticker = %ticker, price = %price, "price overflows account arithmetic");
    Declined::PriceUnavailable {
        ticker: ticker.to_string(),
        reason: format!("price {} overflows account arithmetic", price),
    }
}
