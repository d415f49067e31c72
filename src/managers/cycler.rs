//! Retention ledger for one (model, storage) pair.
//!
//! Every successful upload is recorded as a [`Package`]; once more than `keep`
//! packages exist the oldest ones are deleted from the storage and dropped
//! from the ledger. The ledger is a JSON array on disk, loaded on first use
//! and written back once per pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CyclerError {
    #[error("Failed to read ledger {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse ledger {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write ledger {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// One retained upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Primary remote key (file name, or chunk directory name)
    pub file_key: String,
    /// Remote keys of the members when the upload was a chunk set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_keys: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Package {
    pub fn new(file_key: &str, file_keys: &[String]) -> Self {
        Self {
            file_key: file_key.to_string(),
            file_keys: file_keys.to_vec(),
            created_at: Utc::now(),
        }
    }

    /// Remote keys to delete, members first.
    ///
    /// A package with members is a directory, so its primary key is requested
    /// with a trailing `/` letting the storage remove the container as well.
    pub fn deletion_keys(&self) -> Vec<String> {
        let mut keys = self.file_keys.clone();
        if !self.file_keys.is_empty() && !self.file_key.ends_with('/') {
            keys.push(format!("{}/", self.file_key));
        } else {
            keys.push(self.file_key.clone());
        }
        keys
    }
}

/// Ledger path for one (model, storage) pair: `<state>/cycler/<model>/<storage>.json`.
///
/// Names are single path components (see the config validation), so the
/// directory level keeps every pair on its own file.
pub fn ledger_path(state_directory: &Path, model: &str, storage: &str) -> PathBuf {
    state_directory
        .join("cycler")
        .join(model)
        .join(format!("{}.json", storage))
}

/// In-memory view of one ledger file
#[derive(Debug)]
pub struct Cycler {
    path: PathBuf,
    packages: Vec<Package>,
    loaded: bool,
    load_attempted: bool,
}

impl Cycler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            packages: Vec::new(),
            loaded: false,
            load_attempted: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Packages in upload order, oldest first
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Read the ledger, seeding an empty one when the file does not exist.
    ///
    /// On failure the cycler stays unloaded with an empty list; it will then
    /// neither prune nor save.
    pub fn load(&mut self) -> Result<(), CyclerError> {
        self.load_attempted = true;
        self.loaded = false;
        self.packages.clear();

        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent).map_err(|source| CyclerError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
            fs::write(&self.path, "[]").map_err(|source| CyclerError::Write {
                path: self.path.clone(),
                source,
            })?;
            debug!("Seeded empty ledger {}", self.path.display());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| CyclerError::Read {
            path: self.path.clone(),
            source,
        })?;

        if !content.trim().is_empty() {
            self.packages = serde_json::from_str(&content).map_err(|source| CyclerError::Parse {
                path: self.path.clone(),
                source,
            })?;
        }

        self.loaded = true;
        Ok(())
    }

    /// Load on first use only; failures are logged
    fn ensure_loaded(&mut self) {
        if self.load_attempted {
            return;
        }
        if let Err(e) = self.load() {
            warn!("{}; retention is skipped and the ledger left untouched", e);
        }
    }

    /// Append a package for a new upload. Never deduplicates.
    pub fn record(&mut self, file_key: &str, file_keys: &[String]) {
        self.add(Package::new(file_key, file_keys));
    }

    pub fn add(&mut self, package: Package) {
        self.ensure_loaded();
        self.packages.push(package);
    }

    /// Remove and return the oldest package when more than `keep` are held
    pub fn shift_by_keep(&mut self, keep: usize) -> Option<Package> {
        if self.packages.len() > keep {
            Some(self.packages.remove(0))
        } else {
            None
        }
    }

    /// Drop packages beyond `keep`, oldest first, calling `delete` for every
    /// remote key they own. A failed delete is logged and the pass goes on.
    /// `keep == 0` keeps everything; an unloaded ledger is never pruned.
    pub fn enforce<F>(&mut self, keep: usize, mut delete: F) -> Vec<Package>
    where
        F: FnMut(&str) -> anyhow::Result<()>,
    {
        self.ensure_loaded();

        let mut removed = Vec::new();
        if keep == 0 || !self.loaded {
            return removed;
        }

        while let Some(package) = self.shift_by_keep(keep) {
            for key in package.deletion_keys() {
                info!("Deleting expired {}", key);
                if let Err(e) = delete(&key) {
                    warn!("Failed to delete {}: {:#}", key, e);
                }
            }
            removed.push(package);
        }

        removed
    }

    /// Write the ledger back. Returns `false` without touching the file when
    /// it was never loaded.
    pub fn save(&self) -> Result<bool, CyclerError> {
        if !self.loaded {
            warn!("Skip saving {} because it was not loaded", self.path.display());
            return Ok(false);
        }

        let write_err = |source| CyclerError::Write {
            path: self.path.clone(),
            source,
        };

        let content = serde_json::to_string_pretty(&self.packages)
            .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;

        debug!("Saved {} packages to {}", self.packages.len(), self.path.display());
        Ok(true)
    }

    /// One full retention pass after an upload: record, enforce, save
    pub fn run<F>(&mut self, file_key: &str, file_keys: &[String], keep: usize, delete: F) -> Vec<Package>
    where
        F: FnMut(&str) -> anyhow::Result<()>,
    {
        self.record(file_key, file_keys);
        let removed = self.enforce(keep, delete);

        info!("Cycler: {} packages kept, {} expired", self.packages.len(), removed.len());
        if let Err(e) = self.save() {
            warn!("{}", e);
        }
        removed
    }
}
