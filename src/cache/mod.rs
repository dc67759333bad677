//! Durable dedup cache of previously seen identifiers
//!
//! The snapshot is a JSON array of identifiers. It is read once when a run
//! starts and rewritten after every committed discovery batch. Writes go to a
//! sibling temp file that is renamed over the snapshot, so a crash mid-write
//! leaves the previous snapshot intact.
//!
//! Entries are never evicted. Presence only means an identifier was seen on a
//! listing page once, not that its record was ever enriched.

use crate::SyncError;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Set of identifiers already discovered in earlier runs
#[derive(Debug, Clone)]
pub struct DedupCache {
    path: PathBuf,
    identifiers: HashSet<String>,
}

impl DedupCache {
    /// Loads the snapshot at `path`
    ///
    /// A missing snapshot yields an empty cache; an unreadable or corrupt one is
    /// an error.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let identifiers = if path.exists() {
            let raw = fs::read(path).map_err(|e| cache_error(path, e))?;
            let list: Vec<String> = serde_json::from_slice(&raw).map_err(|e| cache_error(path, e))?;
            list.into_iter().collect()
        } else {
            tracing::info!("No cache snapshot at {}, starting empty", path.display());
            HashSet::new()
        };

        tracing::debug!(
            "Loaded {} cached identifiers from {}",
            identifiers.len(),
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            identifiers,
        })
    }

    /// Writes the snapshot via temp file + rename
    pub fn save(&self) -> Result<(), SyncError> {
        let mut sorted: Vec<&String> = self.identifiers.iter().collect();
        sorted.sort();
        let raw = serde_json::to_vec(&sorted).map_err(|e| cache_error(&self.path, e))?;

        let tmp_path = temp_path(&self.path);
        {
            let mut file = File::create(&tmp_path).map_err(|e| cache_error(&tmp_path, e))?;
            file.write_all(&raw).map_err(|e| cache_error(&tmp_path, e))?;
            file.sync_all().map_err(|e| cache_error(&tmp_path, e))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| cache_error(&self.path, e))?;

        tracing::debug!(
            "Saved {} identifiers to {}",
            self.identifiers.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Deletes the snapshot on disk and clears the in-memory set
    pub fn reset(&mut self) -> Result<(), SyncError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| cache_error(&self.path, e))?;
        }
        self.identifiers.clear();
        tracing::warn!("Dedup cache at {} was reset", self.path.display());
        Ok(())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    /// Adds committed identifiers; does not persist
    pub fn extend<I: IntoIterator<Item = String>>(&mut self, identifiers: I) {
        self.identifiers.extend(identifiers);
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn cache_error(path: &Path, err: impl std::fmt::Display) -> SyncError {
    SyncError::Cache {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
