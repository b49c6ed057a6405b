//! Core domain types and logic.

pub mod config_validation;
pub mod driver;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod position;
pub mod snapshot;
pub mod universe;
