//! Configuration access port.

use rust_decimal::Decimal;

/// Section/key lookup over an INI-style configuration source.
///
/// Typed getters fall back to `default` when the key is missing or does
/// not parse; validation of ranges lives in `domain::config_validation`.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_decimal(&self, section: &str, key: &str, default: Decimal) -> Decimal;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
