//! One scheduling tick of the trading loop.
//!
//! Intended to be run periodically (cron, systemd timer, ...). Each tick:
//! 1. tries to complete a pending buy, then a pending sell;
//! 2. if holding, refreshes the percent change and submits a sell once it
//!    exceeds the exit threshold;
//! 3. if flat, asks the candidate selector for a ticker and submits a buy
//!    for all available cash.
//!
//! Declined outcomes are recorded and never abort the tick; only hard
//! errors (persistence, ledger corruption) do.

use rust_decimal::Decimal;
use std::fmt;
use tracing::{debug, info, warn};

use super::error::{Declined, PaperError};
use super::ledger::EntryId;
use super::lifecycle::{Fill, OrderLifecycle, Outcome, Settlement, Stage};
use crate::ports::candidate_port::CandidateSelector;

#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    /// Percent gain above which an open position is sold.
    pub exit_threshold_pct: Decimal,
}

impl Default for DriverSettings {
    fn default() -> Self {
        DriverSettings {
            exit_threshold_pct: Decimal::new(3, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    BuyCompleted(Fill),
    SellCompleted(Settlement),
    Held { percent_change: Decimal },
    SellSubmitted { entry_id: EntryId, percent_change: Decimal },
    BuySubmitted { entry_id: EntryId, ticker: String, amount: Decimal },
    Waiting(Declined),
    NoCandidate { reason: String },
    NoCash,
}

impl fmt::Display for TickEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickEvent::BuyCompleted(fill) => write!(
                f,
                "bought {} {} shares at ${} ({})",
                fill.shares.round_dp(4),
                fill.ticker,
                fill.price,
                fill.entry_id
            ),
            TickEvent::SellCompleted(s) => write!(
                f,
                "sold {} at ${}, proceeds ${}, profit ${} ({})",
                s.ticker,
                s.price,
                s.proceeds.round_dp(2),
                s.profit.round_dp(2),
                s.entry_id
            ),
            TickEvent::Held { percent_change } => {
                write!(f, "holding, change {}%", percent_change.round_dp(2))
            }
            TickEvent::SellSubmitted {
                entry_id,
                percent_change,
            } => write!(
                f,
                "sell submitted at {}% ({})",
                percent_change.round_dp(2),
                entry_id
            ),
            TickEvent::BuySubmitted {
                entry_id,
                ticker,
                amount,
            } => write!(f, "buy submitted: {} for ${} ({})", ticker, amount, entry_id),
            TickEvent::Waiting(reason) => write!(f, "waiting: {}", reason),
            TickEvent::NoCandidate { reason } => write!(f, "no candidate: {}", reason),
            TickEvent::NoCash => write!(f, "flat with no cash to invest"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub events: Vec<TickEvent>,
    pub stage: Stage,
}

pub fn run_tick(
    account: &mut OrderLifecycle<'_>,
    selector: &dyn CandidateSelector,
    settings: &DriverSettings,
) -> Result<TickReport, PaperError> {
    let mut events = Vec::new();

    if account.state().pending_purchase {
        events.push(match account.complete_trade()? {
            Outcome::Done(fill) => TickEvent::BuyCompleted(fill),
            Outcome::Declined(reason) => TickEvent::Waiting(reason),
        });
    }

    if account.state().pending_sell {
        events.push(match account.complete_sell()? {
            Outcome::Done(settlement) => TickEvent::SellCompleted(settlement),
            Outcome::Declined(reason) => TickEvent::Waiting(reason),
        });
    }

    if account.state().holding.is_some() && !account.state().pending_sell {
        match account.recompute_unrealized_change()? {
            Outcome::Done(pct) if pct > settings.exit_threshold_pct => {
                info!(
                    pct = %pct,
                    threshold = %settings.exit_threshold_pct,
                    "exit threshold reached"
                );
                events.push(match account.submit_sell()? {
                    Outcome::Done(entry_id) => TickEvent::SellSubmitted {
                        entry_id,
                        percent_change: pct,
                    },
                    Outcome::Declined(reason) => TickEvent::Waiting(reason),
                });
            }
            Outcome::Done(pct) => events.push(TickEvent::Held {
                percent_change: pct,
            }),
            Outcome::Declined(reason) => events.push(TickEvent::Waiting(reason)),
        }
    }

    if account.stage() == Stage::Flat {
        let cash = account.state().cash;
        if cash <= Decimal::ZERO {
            debug!("flat with no cash, skipping candidate selection");
            events.push(TickEvent::NoCash);
        } else {
            match selector.select_next() {
                Ok(ticker) => events.push(match account.submit_order(&ticker, cash)? {
                    Outcome::Done(entry_id) => TickEvent::BuySubmitted {
                        entry_id,
                        ticker: ticker.trim().to_uppercase(),
                        amount: cash,
                    },
                    Outcome::Declined(reason) => TickEvent::Waiting(reason),
                }),
                Err(e) => {
                    warn!(error = %e, "candidate selection failed");
                    events.push(TickEvent::NoCandidate {
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    Ok(TickReport {
        events,
        stage: account.stage(),
    })
}
