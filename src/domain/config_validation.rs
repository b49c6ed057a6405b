//! Configuration validation.
//!
//! Validates all config fields before an account is opened.

use crate::domain::error::PaperError;
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;
use rust_decimal::Decimal;

pub const STORE_KINDS: [&str; 2] = ["json", "sqlite"];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), PaperError> {
    validate_profile_name(config)?;
    validate_store(config)?;
    validate_delay(config)?;
    validate_exit_threshold(config)?;
    validate_codes(config)?;
    Ok(())
}

fn validate_profile_name(config: &dyn ConfigPort) -> Result<(), PaperError> {
    let name = config
        .get_string("profile", "name")
        .ok_or_else(|| PaperError::ConfigMissing {
            section: "profile".to_string(),
            key: "name".to_string(),
        })?;
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(PaperError::ConfigInvalid {
            section: "profile".to_string(),
            key: "name".to_string(),
            reason: "name must be non-empty and use only letters, digits, '-' or '_'"
                .to_string(),
        });
    }
    Ok(())
}

fn validate_store(config: &dyn ConfigPort) -> Result<(), PaperError> {
    let kind = config
        .get_string("profile", "store")
        .unwrap_or_else(|| "json".to_string());
    if !STORE_KINDS.contains(&kind.as_str()) {
        return Err(PaperError::ConfigInvalid {
            section: "profile".to_string(),
            key: "store".to_string(),
            reason: format!("unknown store '{}', expected json or sqlite", kind),
        });
    }
    Ok(())
}

fn validate_delay(config: &dyn ConfigPort) -> Result<(), PaperError> {
    let value = config.get_int("execution", "delay_minutes", 10);
    if value < 0 {
        return Err(PaperError::ConfigInvalid {
            section: "execution".to_string(),
            key: "delay_minutes".to_string(),
            reason: "delay_minutes must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_exit_threshold(config: &dyn ConfigPort) -> Result<(), PaperError> {
    if let Some(raw) = config.get_string("execution", "exit_threshold_pct") {
        let parsed: Result<Decimal, _> = raw.trim().parse();
        match parsed {
            Ok(v) if v >= Decimal::ZERO => {}
            _ => {
                return Err(PaperError::ConfigInvalid {
                    section: "execution".to_string(),
                    key: "exit_threshold_pct".to_string(),
                    reason: "exit_threshold_pct must be a non-negative number".to_string(),
                });
            }
        }
    }
    Ok(())
}

fn validate_codes(config: &dyn ConfigPort) -> Result<(), PaperError> {
    match config.get_string("market", "codes") {
        Some(codes) if !codes.trim().is_empty() => {
            parse_codes(&codes).map_err(|e| PaperError::ConfigInvalid {
                section: "market".to_string(),
                key: "codes".to_string(),
                reason: e.to_string(),
            })?;
            Ok(())
        }
        _ => Ok(()),
    }
}
