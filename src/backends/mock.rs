//! In-memory backends for tests.
//!
//! [`MockBackends::register`] adds a `mock` type to every registry. All mock
//! instances built from one `MockBackends` share an event log, so tests can
//! assert ordering across databases, storages and notifiers. Failures are
//! requested per entry through its configuration:
//!
//! - databases: `fail = true`, `panic = true`
//! - storages: `fail_open = true`, `fail_upload = true`, `fail_delete = ["key", ...]`
//! - notifiers: `fail = true`

use super::{
    adapter_options, Database, DatabaseContext, FileItem, Notifier, NotifierContext, Registries,
    Storage, StorageContext,
};
use crate::registry::RegistryError;
use crate::stages::Artifact;
use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

pub const MOCK_TYPE: &str = "mock";

#[derive(Clone, Default)]
pub struct MockBackends {
    events: Arc<Mutex<Vec<String>>>,
    /// Remote keys currently held by each mock storage, by entry name
    remote: Arc<Mutex<BTreeMap<String, BTreeSet<String>>>>,
}

impl MockBackends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the `mock` type in every registry
    pub fn register(&self, registries: &mut Registries) -> Result<(), RegistryError> {
        let shared = self.clone();
        registries.databases.register(
            MOCK_TYPE,
            Box::new(move |ctx: DatabaseContext| {
                Ok(Box::new(FakeDatabase::new(ctx, shared.clone())?) as Box<dyn Database>)
            }),
        )?;

        let shared = self.clone();
        registries.storages.register(
            MOCK_TYPE,
            Box::new(move |ctx: StorageContext| {
                Ok(Box::new(FakeStorage::new(ctx, shared.clone())?) as Box<dyn Storage>)
            }),
        )?;

        let shared = self.clone();
        registries.notifiers.register(
            MOCK_TYPE,
            Box::new(move |ctx: NotifierContext| {
                Ok(Box::new(FakeNotifier::new(ctx, shared.clone())?) as Box<dyn Notifier>)
            }),
        )?;

        Ok(())
    }

    /// Registries holding only the mock backends
    pub fn registries(&self) -> Result<Registries, RegistryError> {
        let mut registries = Registries::empty();
        self.register(&mut registries)?;
        Ok(registries)
    }

    /// Every recorded event, in order
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Recorded events starting with `prefix`
    pub fn events_with(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    /// Remote keys currently held by the storage entry `name`
    pub fn stored(&self, name: &str) -> Vec<String> {
        self.remote
            .lock()
            .unwrap()
            .get(name)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Put keys onto a mock storage as if uploaded earlier
    pub fn seed(&self, name: &str, keys: &[&str]) {
        let mut remote = self.remote.lock().unwrap();
        let held = remote.entry(name.to_string()).or_default();
        held.extend(keys.iter().map(|k| k.to_string()));
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Debug, Default, Deserialize)]
struct FakeDatabaseOptions {
    #[serde(default)]
    fail: bool,
    #[serde(default)]
    panic: bool,
}

pub struct FakeDatabase {
    ctx: DatabaseContext,
    options: FakeDatabaseOptions,
    shared: MockBackends,
}

impl FakeDatabase {
    fn new(ctx: DatabaseContext, shared: MockBackends) -> Result<Self> {
        let options = adapter_options(&ctx.config)?;
        Ok(Self {
            ctx,
            options,
            shared,
        })
    }
}

impl Database for FakeDatabase {
    fn perform(&self) -> Result<()> {
        let name = self.ctx.config.label();
        self.shared.record(format!("dump:{}", name));

        if self.options.panic {
            panic!("mock database '{}' panicked", name);
        }
        if self.options.fail {
            bail!("mock database '{}' failed", name);
        }

        std::fs::create_dir_all(&self.ctx.dump_path)?;
        std::fs::write(self.ctx.dump_path.join(format!("{}.dump", name)), name)?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct FakeStorageOptions {
    #[serde(default)]
    fail_open: bool,
    #[serde(default)]
    fail_upload: bool,
    #[serde(default)]
    fail_delete: Vec<String>,
}

pub struct FakeStorage {
    name: String,
    options: FakeStorageOptions,
    shared: MockBackends,
}

impl FakeStorage {
    fn new(ctx: StorageContext, shared: MockBackends) -> Result<Self> {
        let options = adapter_options(&ctx.config)?;
        Ok(Self {
            name: ctx.config.label().to_string(),
            options,
            shared,
        })
    }
}

impl Storage for FakeStorage {
    fn open(&mut self) -> Result<()> {
        self.shared.record(format!("open:{}", self.name));
        if self.options.fail_open {
            bail!("mock storage '{}' refused to open", self.name);
        }
        Ok(())
    }

    fn upload(&self, artifact: &Artifact) -> Result<()> {
        let key = artifact.key();
        self.shared.record(format!("upload:{}:{}", self.name, key));
        if self.options.fail_upload {
            bail!("mock storage '{}' failed to upload {}", self.name, key);
        }

        let uploaded: Vec<String> = artifact.uploads().into_iter().map(|(k, _)| k).collect();
        let mut remote = self.shared.remote.lock().unwrap();
        remote.entry(self.name.clone()).or_default().extend(uploaded);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.shared.record(format!("delete:{}:{}", self.name, key));
        if self.options.fail_delete.iter().any(|k| k == key) {
            bail!("mock storage '{}' failed to delete {}", self.name, key);
        }

        let mut remote = self.shared.remote.lock().unwrap();
        let held = remote.entry(self.name.clone()).or_default();
        if key.ends_with('/') {
            // Directory marker: gone once no member is left
            if held.iter().any(|k| k.starts_with(key)) {
                bail!("directory {} is not empty", key);
            }
            return Ok(());
        }
        if !held.remove(key) {
            bail!("{} not found", key);
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<FileItem>> {
        Ok(self
            .shared
            .stored(&self.name)
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .map(|name| FileItem {
                name,
                size: 0,
                modified: None,
            })
            .collect())
    }

    fn download(&self, key: &str) -> Result<String> {
        Ok(format!("mock://{}/{}", self.name, key))
    }

    fn close(&mut self) {
        self.shared.record(format!("close:{}", self.name));
    }
}

#[derive(Debug, Default, Deserialize)]
struct FakeNotifierOptions {
    #[serde(default)]
    fail: bool,
}

pub struct FakeNotifier {
    name: String,
    options: FakeNotifierOptions,
    shared: MockBackends,
}

impl FakeNotifier {
    fn new(ctx: NotifierContext, shared: MockBackends) -> Result<Self> {
        let options = adapter_options(&ctx.config)?;
        Ok(Self {
            name: ctx.config.label().to_string(),
            options,
            shared,
        })
    }
}

impl Notifier for FakeNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        self.shared
            .record(format!("notify:{}:{}", self.name, title));
        if self.options.fail {
            bail!("mock notifier '{}' failed: {}", self.name, message);
        }
        Ok(())
    }
}
