//! Ledger export port.

use crate::domain::error::PaperError;
use crate::domain::ledger::LedgerEntry;
use std::path::{Path, PathBuf};

pub trait LedgerExporter {
    /// Write `entries` to `destination`, returning the path actually written.
    fn export(&self, entries: &[LedgerEntry], destination: &Path) -> Result<PathBuf, PaperError>;
}
