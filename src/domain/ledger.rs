//! Trade ledger: one entry per buy/sell round trip.
//!
//! Entries are appended at buy submission and then filled in through
//! completion. They are never removed, and a closed entry never changes.
//! Entries are addressed by a stable [`EntryId`] rather than by position.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::PaperError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a round trip currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPhase {
    BuySubmitted,
    Holding,
    SellSubmitted,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub ticker: String,
    pub buy_invested_amount: Decimal,
    pub buy_submission_time: DateTime<Utc>,
    #[serde(default)]
    pub buy_completed_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_order_price: Option<Decimal>,
    #[serde(default)]
    pub shares_holding: Option<Decimal>,
    #[serde(default)]
    pub sell_order_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sell_completed_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profit: Option<Decimal>,
}

impl LedgerEntry {
    pub fn phase(&self) -> EntryPhase {
        if self.sell_completed_time.is_some() {
            EntryPhase::Closed
        } else if self.sell_order_time.is_some() {
            EntryPhase::SellSubmitted
        } else if self.buy_completed_time.is_some() {
            EntryPhase::Holding
        } else {
            EntryPhase::BuySubmitted
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase() != EntryPhase::Closed
    }
}

/// A partial update moving an entry to its next phase.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerUpdate {
    BuyCompleted {
        at: DateTime<Utc>,
        price: Decimal,
        shares: Decimal,
    },
    SellSubmitted {
        at: DateTime<Utc>,
    },
    SellCompleted {
        at: DateTime<Utc>,
        profit: Decimal,
    },
}

impl LedgerUpdate {
    fn required_phase(&self) -> EntryPhase {
        match self {
            LedgerUpdate::BuyCompleted { .. } => EntryPhase::BuySubmitted,
            LedgerUpdate::SellSubmitted { .. } => EntryPhase::Holding,
            LedgerUpdate::SellCompleted { .. } => EntryPhase::SellSubmitted,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    entries: Vec<LedgerEntry>,
    #[serde(default)]
    next_id: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new round trip. Fails while another entry is still open.
    pub fn append(
        &mut self,
        ticker: &str,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<EntryId, PaperError> {
        if let Some(open) = self.find_open() {
            return Err(PaperError::LedgerConflict {
                reason: format!("entry {} is still open", open),
            });
        }
        // Ids start at 1 and are never reused, even across reloads.
        let next = self
            .entries
            .iter()
            .map(|e| e.id.0)
            .max()
            .unwrap_or(0)
            .max(self.next_id)
            + 1;
        let id = EntryId(next);
        self.next_id = next;
        self.entries.push(LedgerEntry {
            id,
            ticker: ticker.to_string(),
            buy_invested_amount: amount,
            buy_submission_time: at,
            buy_completed_time: None,
            completed_order_price: None,
            shares_holding: None,
            sell_order_time: None,
            sell_completed_time: None,
            profit: None,
        });
        Ok(id)
    }

    pub fn get(&self, id: EntryId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn find_open(&self) -> Option<EntryId> {
        self.entries.iter().find(|e| e.is_open()).map(|e| e.id)
    }

    /// Entry whose buy has been submitted but not completed.
    pub fn find_open_buy(&self) -> Option<EntryId> {
        self.find_phase(EntryPhase::BuySubmitted)
    }

    /// Entry whose buy completed and which has no sell order yet.
    pub fn find_holding(&self) -> Option<EntryId> {
        self.find_phase(EntryPhase::Holding)
    }

    /// Entry whose sell has been submitted but not completed.
    pub fn find_open_sell(&self) -> Option<EntryId> {
        self.find_phase(EntryPhase::SellSubmitted)
    }

    fn find_phase(&self, phase: EntryPhase) -> Option<EntryId> {
        self.entries
            .iter()
            .find(|e| e.phase() == phase)
            .map(|e| e.id)
    }

    /// Apply a phase transition to a single entry.
    pub fn update(&mut self, id: EntryId, update: LedgerUpdate) -> Result<(), PaperError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| PaperError::LedgerConflict {
                reason: format!("unknown entry {}", id),
            })?;

        let phase = entry.phase();
        if phase != update.required_phase() {
            return Err(PaperError::LedgerConflict {
                reason: format!("entry {} is {:?}, cannot apply {:?}", id, phase, update),
            });
        }

        match update {
            LedgerUpdate::BuyCompleted { at, price, shares } => {
                entry.buy_completed_time = Some(at);
                entry.completed_order_price = Some(price);
                entry.shares_holding = Some(shares);
            }
            LedgerUpdate::SellSubmitted { at } => {
                entry.sell_order_time = Some(at);
            }
            LedgerUpdate::SellCompleted { at, profit } => {
                entry.sell_completed_time = Some(at);
                entry.profit = Some(profit);
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that are not closed. Anything above one is corruption.
    pub fn open_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_open()).count()
    }
}
