//! Domain error types.
//!
//! Two layers: [`Declined`] covers the expected refusals a poller sees every
//! tick (order still pending, nothing to sell, oracle down), while
//! [`PaperError`] is reserved for failures that must abort the current tick.

use chrono::Duration;
use rust_decimal::Decimal;

/// A benign refusal from a lifecycle operation. No state was changed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Declined {
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("an order is already pending")]
    OrderPending,

    #[error("a position is already open")]
    PositionOpen,

    #[error("no pending order to complete")]
    NoPendingOrder,

    #[error("no open position")]
    NoOpenPosition,

    #[error("order still pending, {} seconds remaining", .remaining.num_seconds())]
    StillPending { remaining: Duration },

    #[error("price unavailable for {ticker}: {reason}")]
    PriceUnavailable { ticker: String, reason: String },

    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },
}

/// Top-level error type for papertrader.
#[derive(Debug, thiserror::Error)]
pub enum PaperError {
    #[error("persistence error: {reason}")]
    Persistence { reason: String },

    #[error("profile '{profile}' not found")]
    ProfileNotFound { profile: String },

    #[error("stale snapshot for '{profile}': expected stored version {expected}, found {found}")]
    StaleSnapshot {
        profile: String,
        expected: u64,
        found: u64,
    },

    #[error("ledger conflict: {reason}")]
    LedgerConflict { reason: String },

    #[error("inconsistent account state: {reason}")]
    Inconsistent { reason: String },

    #[error("price unavailable for {ticker}: {reason}")]
    PriceUnavailable { ticker: String, reason: String },

    #[error("no candidate ticker: {reason}")]
    NoCandidate { reason: String },

    #[error("export error: {reason}")]
    Export { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PaperError {
    fn from(err: serde_json::Error) -> Self {
        PaperError::Persistence {
            reason: err.to_string(),
        }
    }
}

impl From<&PaperError> for std::process::ExitCode {
    fn from(err: &PaperError) -> Self {
        let code: u8 = match err {
            PaperError::Io(_) => 1,
            PaperError::ConfigParse { .. }
            | PaperError::ConfigMissing { .. }
            | PaperError::ConfigInvalid { .. } => 2,
            PaperError::Persistence { .. }
            | PaperError::ProfileNotFound { .. }
            | PaperError::StaleSnapshot { .. } => 3,
            PaperError::LedgerConflict { .. } | PaperError::Inconsistent { .. } => 4,
            PaperError::PriceUnavailable { .. } | PaperError::NoCandidate { .. } => 5,
            PaperError::Export { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
