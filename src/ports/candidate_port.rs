//! Candidate selection port.

use crate::domain::error::PaperError;

pub trait CandidateSelector {
    /// Pick the next ticker to buy. Only called when the account is flat.
    fn select_next(&self) -> Result<String, PaperError>;
}
