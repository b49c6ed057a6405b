//! Account position state derived from the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::PaperError;
use super::ledger::{EntryId, EntryPhase, Ledger};

/// The currently open position. Mirrors the single ledger entry in the
/// `Holding` or `SellSubmitted` phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub entry_id: EntryId,
    pub ticker: String,
    pub purchase_price: Decimal,
    pub shares: Decimal,
    #[serde(default)]
    pub percent_change: Option<Decimal>,
}

impl Holding {
    /// `None` when the value does not fit in a `Decimal`.
    pub fn market_value(&self, price: Decimal) -> Option<Decimal> {
        self.shares.checked_mul(price)
    }

    pub fn percent_change_at(&self, price: Decimal) -> Option<Decimal> {
        price
            .checked_sub(self.purchase_price)?
            .checked_div(self.purchase_price)?
            .checked_mul(Decimal::ONE_HUNDRED)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub cash: Decimal,
    #[serde(default)]
    pub invested_capital: Decimal,
    #[serde(default)]
    pub capital_gains: Decimal,
    #[serde(default)]
    pub holding: Option<Holding>,
    #[serde(default)]
    pub pending_purchase: bool,
    #[serde(default)]
    pub pending_sell: bool,
}

impl PositionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cash(cash: Decimal) -> Self {
        PositionState {
            cash,
            ..Self::default()
        }
    }

    pub fn current_holding(&self) -> Option<&str> {
        self.holding.as_ref().map(|h| h.ticker.as_str())
    }

    pub fn current_purchase_price(&self) -> Option<Decimal> {
        self.holding.as_ref().map(|h| h.purchase_price)
    }

    pub fn current_shares(&self) -> Option<Decimal> {
        self.holding.as_ref().map(|h| h.shares)
    }

    pub fn current_percent_change(&self) -> Option<Decimal> {
        self.holding.as_ref().and_then(|h| h.percent_change)
    }

    /// No holding and no pending orders.
    pub fn is_flat(&self) -> bool {
        self.holding.is_none() && !self.pending_purchase && !self.pending_sell
    }

    /// Drop everything tied to the open position.
    pub fn clear_holding(&mut self) {
        self.holding = None;
        self.invested_capital = Decimal::ZERO;
    }

    /// Verify the cached view agrees with the ledger.
    pub fn check_against(&self, ledger: &Ledger) -> Result<(), PaperError> {
        let inconsistent = |reason: String| Err(PaperError::Inconsistent { reason });

        if self.cash < Decimal::ZERO {
            return inconsistent(format!("negative cash {}", self.cash));
        }
        if ledger.open_count() > 1 {
            return inconsistent(format!("{} open ledger entries", ledger.open_count()));
        }
        if self.pending_purchase != ledger.find_open_buy().is_some() {
            return inconsistent(format!(
                "pending_purchase is {} but ledger disagrees",
                self.pending_purchase
            ));
        }
        if self.pending_sell != ledger.find_open_sell().is_some() {
            return inconsistent(format!(
                "pending_sell is {} but ledger disagrees",
                self.pending_sell
            ));
        }

        let held = ledger.entries().iter().find(|e| {
            matches!(e.phase(), EntryPhase::Holding | EntryPhase::SellSubmitted)
        });
        match (&self.holding, held) {
            (None, None) => Ok(()),
            (Some(h), Some(entry)) if h.entry_id == entry.id && h.ticker == entry.ticker => Ok(()),
            (Some(h), Some(entry)) => inconsistent(format!(
                "holding {} {} does not match ledger entry {} {}",
                h.entry_id, h.ticker, entry.id, entry.ticker
            )),
            (Some(h), None) => inconsistent(format!(
                "holding {} has no open ledger entry",
                h.ticker
            )),
            (None, Some(entry)) => inconsistent(format!(
                "ledger entry {} is held but state has no holding",
                entry.id
            )),
        }
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = |v: Decimal| v.round_dp(2);
        writeln!(f, "Cash: ${}", dp(self.cash))?;
        writeln!(f, "Invested Capital: ${}", dp(self.invested_capital))?;
        writeln!(f, "Capital Gains: ${}", dp(self.capital_gains))?;
        writeln!(f, "Pending Purchase: {}", self.pending_purchase)?;
        writeln!(f, "Pending Sell: {}", self.pending_sell)?;
        match &self.holding {
            Some(h) => {
                writeln!(f, "Current Stock Holding: {}", h.ticker)?;
                writeln!(f, "Current Stock Purchase Price: ${}", dp(h.purchase_price))?;
                match h.percent_change {
                    Some(pct) => writeln!(f, "Current Percentage Change: {}%", dp(pct))?,
                    None => writeln!(f, "Current Percentage Change: -")?,
                }
                write!(f, "Current Number of Shares: {}", h.shares.round_dp(4))
            }
            None => write!(f, "Current Stock Holding: none"),
        }
    }
}
