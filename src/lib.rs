//! papertrader: single-account paper-trading simulator.
//!
//! Hexagonal architecture: the order lifecycle and ledger live in
//! [`domain`], port traits in [`ports`], concrete implementations in
//! [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
