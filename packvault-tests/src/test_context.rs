//! Test harness: a config, the mock backends and a recording executor

use crate::config_builder::ConfigBuilder;
use packvault::backends::mock::MockBackends;
use packvault::config::{find_model, resolve_all_models, Config, ModelConfig};
use packvault::managers::cycler::{ledger_path, Package};
use packvault::managers::model::PipelineManager;
use packvault::utils::executor::mock::MockExecutor;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestContext {
    temp_dir: TempDir,
    config: Config,
    pub backends: MockBackends,
    pub executor: MockExecutor,
}

impl TestContext {
    pub fn from_builder(builder: ConfigBuilder) -> Self {
        Self::with_executor(builder, MockExecutor::new())
    }

    pub fn with_minimal_config() -> Self {
        Self::from_builder(ConfigBuilder::minimal())
    }

    pub fn with_executor(builder: ConfigBuilder, executor: MockExecutor) -> Self {
        let (config, temp_dir) = builder.persist();
        Self {
            temp_dir,
            config,
            backends: MockBackends::new(),
            executor,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn model(&self, name: &str) -> ModelConfig {
        find_model(&self.config, name).expect("model not in config")
    }

    /// Manager over the mock backends only
    pub fn manager(&self) -> PipelineManager {
        let registries = self
            .backends
            .registries()
            .expect("mock registration failed");
        PipelineManager::new(
            Arc::new(registries),
            Arc::new(self.executor.clone()),
            resolve_all_models(&self.config),
        )
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.config.global.workspace.clone()
    }

    /// Run directories still present under the workspace root
    pub fn leftover_workspaces(&self) -> Vec<PathBuf> {
        match fs::read_dir(self.workspace_root()) {
            Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn ledger_file(&self, model: &str, storage: &str) -> PathBuf {
        ledger_path(&self.config.global.state_directory, model, storage)
    }

    /// Ledger contents, or an empty list when the file does not exist
    pub fn ledger(&self, model: &str, storage: &str) -> Vec<Package> {
        match fs::read_to_string(self.ledger_file(model, storage)) {
            Ok(content) => serde_json::from_str(&content).expect("ledger is not valid JSON"),
            Err(_) => Vec::new(),
        }
    }

    /// Write a ledger as if earlier runs had uploaded `packages`
    pub fn seed_ledger(&self, model: &str, storage: &str, packages: &[Package]) {
        let path = self.ledger_file(model, storage);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create ledger dir");
        }
        let content = serde_json::to_string_pretty(packages).expect("Failed to serialize ledger");
        fs::write(path, content).expect("Failed to write ledger");
    }

    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    fn assert_ok(self) -> T;

    /// Assert Err whose Display output contains `needle`
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {}", e),
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => {
                let message = e.to_string();
                assert!(
                    message.contains(needle),
                    "Error '{}' does not contain '{}'",
                    message,
                    needle
                );
            }
        }
    }
}
