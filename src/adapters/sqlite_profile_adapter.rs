//! SQLite profile store.
//!
//! Snapshots live in a single `profiles` table keyed by profile name, with
//! the version held in its own column so saves can compare-and-swap inside
//! one transaction. Several processes may share the database file.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::domain::error::PaperError;
use crate::domain::snapshot::{check_version, Snapshot};
use crate::ports::config_port::ConfigPort;
use crate::ports::profile_port::ProfileStore;

pub struct SqliteProfileStore {
    pool: Pool<SqliteConnectionManager>,
    profile: String,
}

fn db_err(e: impl std::fmt::Display) -> PaperError {
    PaperError::Persistence {
        reason: e.to_string(),
    }
}

impl SqliteProfileStore {
    pub fn from_config(config: &dyn ConfigPort, profile: &str) -> Result<Self, PaperError> {
        let db_path =
            config
                .get_string("profile", "path")
                .ok_or_else(|| PaperError::ConfigMissing {
                    section: "profile".into(),
                    key: "path".into(),
                })?;
        let pool_size = config.get_int("profile", "pool_size", 2).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        let store = Self {
            pool,
            profile: profile.to_string(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory(profile: &str) -> Result<Self, PaperError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;

        let store = Self {
            pool,
            profile: profile.to_string(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), PaperError> {
        let conn = self.pool.get().map_err(db_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                name TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                saved_at TEXT,
                snapshot TEXT NOT NULL
            );",
        )
        .map_err(db_err)?;
        Ok(())
    }
}

impl ProfileStore for SqliteProfileStore {
    fn load(&self) -> Result<Snapshot, PaperError> {
        let conn = self.pool.get().map_err(db_err)?;
        let text: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM profiles WHERE name = ?1",
                params![self.profile],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        match text {
            Some(text) => Snapshot::from_json(&text),
            None => Err(PaperError::ProfileNotFound {
                profile: self.profile.clone(),
            }),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PaperError> {
        let text = snapshot.to_json()?;
        let saved_at = snapshot.saved_at.map(|t| t.to_rfc3339());

        let mut conn = self.pool.get().map_err(db_err)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        let stored: u64 = tx
            .query_row(
                "SELECT version FROM profiles WHERE name = ?1",
                params![self.profile],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(db_err)?
            .map(|v| v as u64)
            .unwrap_or(0);
        check_version(&self.profile, stored, snapshot.version)?;

        if stored == 0 {
            tx.execute(
                "INSERT INTO profiles (name, version, saved_at, snapshot) VALUES (?1, ?2, ?3, ?4)",
                params![self.profile, snapshot.version as i64, saved_at, text],
            )
            .map_err(db_err)?;
        } else {
            tx.execute(
                "UPDATE profiles SET version = ?2, saved_at = ?3, snapshot = ?4
                 WHERE name = ?1 AND version = ?5",
                params![
                    self.profile,
                    snapshot.version as i64,
                    saved_at,
                    text,
                    stored as i64
                ],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        debug!(profile = %self.profile, version = snapshot.version, "profile saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn snapshot(version: u64) -> Snapshot {
        let mut snap = Snapshot::fresh("derek");
        snap.version = version;
        snap.state.cash = dec!(20);
        snap
    }

    #[test]
    fn load_missing_profile() {
        let store = SqliteProfileStore::in_memory("derek").unwrap();
        assert!(matches!(store.load(), Err(PaperError::ProfileNotFound { .. })));
    }

    #[test]
    fn save_then_load_round_trip() {
        let store = SqliteProfileStore::in_memory("derek").unwrap();
        let mut snap = snapshot(1);
        snap.saved_at = Some(Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap());
        store.save(&snap).unwrap();
        assert_eq!(store.load().unwrap(), snap);

        let mut next = snap.clone();
        next.version = 2;
        next.state.cash = dec!(22.5);
        store.save(&next).unwrap();
        assert_eq!(store.load().unwrap(), next);
    }

    #[test]
    fn stale_save_rejected() {
        let store = SqliteProfileStore::in_memory("derek").unwrap();
        store.save(&snapshot(1)).unwrap();
        let err = store.save(&snapshot(1)).unwrap_err();
        assert!(matches!(err, PaperError::StaleSnapshot { found: 1, .. }));
    }

    #[test]
    fn profiles_are_isolated_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("profiles.db");
        let ini = format!("[profile]\npath = {}\n", db.display());
        let config = FileConfigAdapter::from_string(&ini).unwrap();

        let derek = SqliteProfileStore::from_config(&config, "derek").unwrap();
        let sam = SqliteProfileStore::from_config(&config, "sam").unwrap();
        derek.save(&snapshot(1)).unwrap();

        assert!(derek.load().is_ok());
        assert!(matches!(sam.load(), Err(PaperError::ProfileNotFound { .. })));
    }

    #[test]
    fn from_config_requires_path() {
        let config = FileConfigAdapter::from_string("[profile]\nname = derek\n").unwrap();
        let err = SqliteProfileStore::from_config(&config, "derek").err().unwrap();
        assert!(matches!(err, PaperError::ConfigMissing { key, .. } if key == "path"));
    }
}
