//! Port traits: the seams between the account core and the outside world.

pub mod candidate_port;
pub mod clock_port;
pub mod config_port;
pub mod export_port;
pub mod price_port;
pub mod profile_port;
