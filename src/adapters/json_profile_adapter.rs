//! JSON file profile store.
//!
//! One file per profile at `<dir>/<profile>.json`. Saves go to a hidden
//! temp file in the same directory, are fsynced, then renamed over the
//! previous snapshot so a crash never leaves a half-written profile.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::error::PaperError;
use crate::domain::snapshot::{check_version, Snapshot};
use crate::ports::profile_port::ProfileStore;

pub struct JsonProfileStore {
    dir: PathBuf,
    profile: String,
}

impl JsonProfileStore {
    pub fn new<P: AsRef<Path>>(dir: P, profile: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            profile: profile.to_string(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.profile))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", self.profile))
    }

    fn stored_version(&self) -> Result<u64, PaperError> {
        match self.load() {
            Ok(snapshot) => Ok(snapshot.version),
            Err(PaperError::ProfileNotFound { .. }) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn persistence(&self, action: &str, path: &Path, e: std::io::Error) -> PaperError {
        PaperError::Persistence {
            reason: format!("failed to {} {}: {}", action, path.display(), e),
        }
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self) -> Result<Snapshot, PaperError> {
        let path = self.path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PaperError::ProfileNotFound {
                    profile: self.profile.clone(),
                });
            }
            Err(e) => return Err(self.persistence("read", &path, e)),
        };
        Snapshot::from_json(&text).map_err(|e| PaperError::Persistence {
            reason: format!("corrupt profile {}: {}", path.display(), e),
        })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PaperError> {
        check_version(&self.profile, self.stored_version()?, snapshot.version)?;

        fs::create_dir_all(&self.dir).map_err(|e| self.persistence("create", &self.dir, e))?;
        let text = snapshot.to_json()?;
        let tmp = self.temp_path();
        let mut file = File::create(&tmp).map_err(|e| self.persistence("create", &tmp, e))?;
        file.write_all(text.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| self.persistence("write", &tmp, e))?;
        drop(file);

        let path = self.path();
        fs::rename(&tmp, &path).map_err(|e| self.persistence("replace", &path, e))?;
        debug!(path = %path.display(), version = snapshot.version, "profile saved");
        Ok(())
    }
}
