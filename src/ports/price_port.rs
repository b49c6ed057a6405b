//! Market data port.

use crate::domain::error::PaperError;
use rust_decimal::Decimal;

pub trait PriceOracle {
    /// Last traded or closing price for `ticker`.
    ///
    /// Failures should be reported as [`PaperError::PriceUnavailable`]; the
    /// lifecycle treats any error here as retryable on the next tick.
    fn current_price(&self, ticker: &str) -> Result<Decimal, PaperError>;
}
