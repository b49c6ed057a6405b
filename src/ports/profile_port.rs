//! Profile persistence port.

use crate::domain::error::PaperError;
use crate::domain::snapshot::Snapshot;

/// Durable home for one profile's [`Snapshot`].
///
/// `save` must replace the previous snapshot atomically and must reject a
/// snapshot whose `version` is not exactly one past the stored version
/// (an absent profile counts as version 0) with
/// [`PaperError::StaleSnapshot`].
pub trait ProfileStore {
    /// Fails with [`PaperError::ProfileNotFound`] when nothing has been saved.
    fn load(&self) -> Result<Snapshot, PaperError>;

    fn save(&self, snapshot: &Snapshot) -> Result<(), PaperError>;
}
