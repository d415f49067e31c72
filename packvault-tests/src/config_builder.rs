//! Fluent API for building test configurations
//!
//! Every directory the pipeline touches (workspace, state, logs) lives in a
//! temp dir owned by the builder. Models default to the `mock` backends.

use packvault::config::{
    ArchiveConfig, CompressConfig, Config, GlobalConfig, ModelSection, ScheduleConfig,
    SplitConfig, SubConfig,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Model section with one mock database, storage and notifier
pub fn mock_model(description: &str) -> ModelSection {
    ModelSection {
        enabled: true,
        description: description.to_string(),
        schedule: ScheduleConfig::default(),
        timeout_seconds: None,
        databases: vec![SubConfig::new("main", "mock")],
        archive: None,
        compress_with: CompressConfig::default(),
        encrypt_with: None,
        split_with: None,
        storages: vec![SubConfig::new("disk", "mock")],
        notifiers: vec![SubConfig::new("hook", "mock")],
    }
}

pub struct ConfigBuilder {
    temp_dir: TempDir,
    global: GlobalConfig,
    models: BTreeMap<String, ModelSection>,
}

impl ConfigBuilder {
    /// Empty config whose directories point into a fresh temp dir
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let log_directory = temp_dir.path().join("logs");
        fs::create_dir_all(&log_directory).expect("Failed to create log_directory");

        let global = GlobalConfig {
            workspace: temp_dir.path().join("work"),
            state_directory: temp_dir.path().join("state"),
            default_timeout_seconds: 60,
            log_directory,
            log_level: "debug".to_string(),
            log_max_files: 5,
        };

        Self {
            temp_dir,
            global,
            models: BTreeMap::new(),
        }
    }

    /// One model named `app` on the mock backends
    pub fn minimal() -> Self {
        Self::new().add_model("app")
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.global.default_timeout_seconds = seconds;
        self
    }

    pub fn with_state_directory(mut self, path: &Path) -> Self {
        self.global.state_directory = path.to_path_buf();
        self
    }

    pub fn add_model(mut self, name: &str) -> Self {
        self.models
            .insert(name.to_string(), mock_model(&format!("Test model: {}", name)));
        self
    }

    pub fn add_disabled_model(mut self, name: &str) -> Self {
        let mut model = mock_model(&format!("Disabled model: {}", name));
        model.enabled = false;
        self.models.insert(name.to_string(), model);
        self
    }

    pub fn add_model_config(mut self, name: &str, model: ModelSection) -> Self {
        self.models.insert(name.to_string(), model);
        self
    }

    /// Edit an existing model in place
    pub fn configure(mut self, name: &str, edit: impl FnOnce(&mut ModelSection)) -> Self {
        let model = self
            .models
            .get_mut(name)
            .unwrap_or_else(|| panic!("model '{}' was not added", name));
        edit(model);
        self
    }

    pub fn with_databases(self, name: &str, databases: Vec<SubConfig>) -> Self {
        self.configure(name, |m| m.databases = databases)
    }

    pub fn with_storages(self, name: &str, storages: Vec<SubConfig>) -> Self {
        self.configure(name, |m| m.storages = storages)
    }

    pub fn with_notifiers(self, name: &str, notifiers: Vec<SubConfig>) -> Self {
        self.configure(name, |m| m.notifiers = notifiers)
    }

    pub fn with_archive(self, name: &str, includes: &[&str], excludes: &[&str]) -> Self {
        let archive = ArchiveConfig {
            includes: includes.iter().map(|s| s.to_string()).collect(),
            excludes: excludes.iter().map(|s| s.to_string()).collect(),
        };
        self.configure(name, |m| m.archive = Some(archive))
    }

    pub fn with_split(self, name: &str, chunk_size: &str) -> Self {
        let split = SplitConfig {
            chunk_size: chunk_size.to_string(),
            suffix_length: 3,
            numeric_suffixes: true,
        };
        self.configure(name, |m| m.split_with = Some(split))
    }

    pub fn build(self) -> Config {
        self.persist().0
    }

    /// Config plus the temp dir it points into; keep the dir alive
    pub fn persist(self) -> (Config, TempDir) {
        let config = Config {
            global: self.global,
            models: self.models,
        };
        (config, self.temp_dir)
    }

    /// Write the config as TOML into its temp dir
    pub fn write(self) -> (PathBuf, TempDir) {
        let (config, temp_dir) = self.persist();
        let path = temp_dir.path().join("packvault.toml");
        let content = toml::to_string_pretty(&config).expect("Failed to serialize config");
        fs::write(&path, content).expect("Failed to write config");
        (path, temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
