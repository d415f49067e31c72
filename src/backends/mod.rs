//! Capability interfaces for pluggable backends and the registries that map
//! a configured `type` to a factory.
//!
//! The orchestrator only sees [`Database`], [`Storage`] and [`Notifier`]
//! trait objects; concrete adapters live in the submodules and are added to a
//! [`Registries`] by [`Registries::builtin`].

pub mod database;
pub mod mock;
pub mod notifier;
pub mod storage;

use crate::config::{ModelConfig, SubConfig};
use crate::registry::{Registry, RegistryError};
use crate::stages::Artifact;
use crate::utils::CommandExecutor;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything a database adapter gets when it is built
#[derive(Clone)]
pub struct DatabaseContext {
    pub model: String,
    pub config: SubConfig,
    /// Directory the dump must be written into: `<dump>/<type>/<name>`
    pub dump_path: PathBuf,
    pub timeout: Duration,
    pub executor: Arc<dyn CommandExecutor>,
}

/// One-shot dump of a database into `DatabaseContext::dump_path`
pub trait Database: Send {
    fn perform(&self) -> Result<()>;
}

/// Everything a storage adapter gets when it is built
#[derive(Clone)]
pub struct StorageContext {
    pub model: String,
    pub config: SubConfig,
    pub timeout: Duration,
    pub executor: Arc<dyn CommandExecutor>,
}

/// Remote object as reported by [`Storage::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Upload destination.
///
/// A session is opened before any other call and closed afterwards, whatever
/// happened in between.
pub trait Storage: Send {
    fn open(&mut self) -> Result<()>;

    /// Upload a single file or every chunk of a chunk set.
    /// Remote keys are [`Artifact::key`] and [`Artifact::secondary_keys`].
    fn upload(&self, artifact: &Artifact) -> Result<()>;

    /// Delete one remote object; a key ending in `/` names a directory
    fn delete(&self, key: &str) -> Result<()>;

    fn list(&self, prefix: &str) -> Result<Vec<FileItem>>;

    /// Locator (URL or path) the object can be fetched from
    fn download(&self, key: &str) -> Result<String>;

    fn close(&mut self);
}

pub struct NotifierContext {
    pub model: String,
    pub config: SubConfig,
    pub timeout: Duration,
}

/// Outcome message channel
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<()>;
}

pub type DatabaseFactory =
    Box<dyn Fn(DatabaseContext) -> Result<Box<dyn Database>> + Send + Sync>;
pub type StorageFactory = Box<dyn Fn(StorageContext) -> Result<Box<dyn Storage>> + Send + Sync>;
pub type NotifierFactory =
    Box<dyn Fn(NotifierContext) -> Result<Box<dyn Notifier>> + Send + Sync>;

/// Options every storage entry accepts besides its adapter-specific ones
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct StorageOptions {
    /// Number of packages to retain; 0 keeps everything
    #[serde(default)]
    pub keep: usize,

    /// Overrides the model timeout for this destination
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// When a notifier is used; evaluated by the dispatcher, not the notifier
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NotifyToggles {
    #[serde(default = "default_true")]
    pub on_success: bool,
    #[serde(default = "default_true")]
    pub on_failure: bool,
}

impl Default for NotifyToggles {
    fn default() -> Self {
        Self {
            on_success: true,
            on_failure: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// The three backend registries, built once and shared read-only
#[derive(Debug)]
pub struct Registries {
    pub databases: Registry<DatabaseFactory>,
    pub storages: Registry<StorageFactory>,
    pub notifiers: Registry<NotifierFactory>,
}

impl Registries {
    pub fn empty() -> Self {
        Self {
            databases: Registry::new("database"),
            storages: Registry::new("storage"),
            notifiers: Registry::new("notifier"),
        }
    }

    /// Registries holding every built-in adapter
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut registries = Self::empty();
        database::register_all(&mut registries.databases)?;
        storage::register_all(&mut registries.storages)?;
        notifier::register_all(&mut registries.notifiers)?;
        Ok(registries)
    }

    /// Configured entries of `model` whose type has no registered factory,
    /// as `(section, name, type)`
    pub fn unknown_types<'a>(&self, model: &'a ModelConfig) -> Vec<(&'static str, &'a str, &'a str)> {
        let mut unknown = Vec::new();

        for db in &model.databases {
            if !self.databases.contains(&db.kind) {
                unknown.push(("databases", db.label(), db.kind.as_str()));
            }
        }
        for storage in &model.storages {
            if !self.storages.contains(&storage.kind) {
                unknown.push(("storages", storage.label(), storage.kind.as_str()));
            }
        }
        for notifier in &model.notifiers {
            if !self.notifiers.contains(&notifier.kind) {
                unknown.push(("notifiers", notifier.label(), notifier.kind.as_str()));
            }
        }

        unknown
    }
}

/// Deserialize adapter options, naming the entry on failure
pub(crate) fn adapter_options<T: serde::de::DeserializeOwned>(config: &SubConfig) -> Result<T> {
    config.settings_as().map_err(|e| {
        anyhow::anyhow!(
            "invalid configuration for {} '{}': {}",
            config.kind,
            config.label(),
            e.message()
        )
    })
}
