//! Durable record of one profile: position state plus the full ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PaperError;
use super::ledger::Ledger;
use super::position::PositionState;

/// Everything needed to resume an account in a new process.
///
/// `version` increases by one on every commit and is what the stores use
/// for compare-and-swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub profile: String,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    pub state: PositionState,
    #[serde(default)]
    pub ledger: Ledger,
}

impl Snapshot {
    /// Version 0 snapshot for a profile that has never been saved.
    pub fn fresh(profile: &str) -> Self {
        Snapshot {
            version: 0,
            profile: profile.to_string(),
            saved_at: None,
            state: PositionState::new(),
            ledger: Ledger::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, PaperError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, PaperError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reject a snapshot whose state does not agree with its ledger.
    pub fn validate(&self) -> Result<(), PaperError> {
        self.state.check_against(&self.ledger)
    }
}

/// Shared compare-and-swap rule for the store adapters.
pub fn check_version(profile: &str, stored: u64, incoming: u64) -> Result<(), PaperError> {
    if incoming != stored + 1 {
        return Err(PaperError::StaleSnapshot {
            profile: profile.to_string(),
            expected: incoming.saturating_sub(1),
            found: stored,
        });
    }
    Ok(())
}
