//! Durable record of announcements that were already emailed.
//!
//! The state file is a single JSON array of id strings:
//!
//! ```text
//! ["Raspored ispita_12.06.2024", "Upis ocjena_10.06.2024"]
//! ```
//!
//! # Missing vs corrupt
//!
//! A missing file means "nothing delivered yet" and loads as an empty set.
//! A file that exists but cannot be read or parsed is an error: treating it as
//! empty would re-send the whole portal history.
//!
//! # Trial mode
//!
//! A store opened in [`RunMode::Trial`] never touches the file: `load` returns
//! an empty set and `save` does nothing.

use crate::error::PersistenceFailure;
use crate::models::{RunMode, SeenSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
    mode: RunMode,
}

impl SeenStore {
    /// Open the store at `path`. Nothing is read until [`SeenStore::load`].
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the JSON array file; it need not exist yet
    /// * `mode` - In [`RunMode::Trial`] the file is never read or written
    pub fn new(path: impl Into<PathBuf>, mode: RunMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read previously delivered ids.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), mode = ?self.mode))]
    pub async fn load(&self) -> Result<SeenSet, PersistenceFailure> {
        if self.mode.is_trial() {
            info!("Trial run; ignoring delivery history");
            return Ok(SeenSet::new());
        }

        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No state file yet; starting with empty history");
                return Ok(SeenSet::new());
            }
            Err(source) => {
                return Err(PersistenceFailure::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let seen: SeenSet =
            serde_json::from_slice(&raw).map_err(|source| PersistenceFailure::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        info!(count = seen.len(), "Loaded delivery history");
        Ok(seen)
    }

    /// Overwrite the state file with a full snapshot of `seen`.
    ///
    /// The snapshot is written to a sibling temp file and renamed into place,
    /// so an interrupted write leaves the previous state intact.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), count = seen.len()))]
    pub async fn save(&self, seen: &SeenSet) -> Result<(), PersistenceFailure> {
        if self.mode.is_trial() {
            info!("Trial run; leaving state file untouched");
            return Ok(());
        }

        let write_err = |source| PersistenceFailure::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let json = serde_json::to_vec(seen).map_err(|e| write_err(e.into()))?;
        let tmp = self.tmp_path();
        fs::write(&tmp, &json).await.map_err(write_err)?;
        fs::rename(&tmp, &self.path).await.map_err(write_err)?;

        debug!(bytes = json.len(), "Wrote state file");
        info!("Saved delivery history");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
