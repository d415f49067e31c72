//! Pipeline orchestrator: runs one model end to end
//!
//! `dump -> archive -> compress -> encrypt -> split -> store -> notify -> cleanup`
//!
//! Stages run strictly in order and the first failure aborts the rest. Every
//! run sends exactly one success or failure notification, and the temporary
//! workspace is removed on every exit path, including a panic inside a stage.

use chrono::{DateTime, Local};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn};

use crate::backends::{
    adapter_options, DatabaseContext, Registries, Storage, StorageContext, StorageOptions,
};
use crate::config::{Config, ModelConfig, SubConfig};
use crate::managers::cycler::{ledger_path, Cycler, Package};
use crate::managers::notification::NotificationManager;
use crate::stages::{archive, compressor, encryptor, splitter, Artifact, StageEnv, Workspace};
use crate::utils::locker::BackupLock;
use crate::utils::CommandExecutor;

/// Pipeline step, used to tag failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dump,
    Archive,
    Compress,
    Encrypt,
    Split,
    Store,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Dump => "dump",
            Stage::Archive => "archive",
            Stage::Compress => "compress",
            Stage::Encrypt => "encrypt",
            Stage::Split => "split",
            Stage::Store => "store",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model '{0}' is disabled")]
    Disabled(String),

    #[error("{0}")]
    Busy(String),

    #[error("[{stage}] {kind} type '{type_name}' is not implemented (entry '{name}')")]
    Unsupported {
        stage: Stage,
        kind: &'static str,
        type_name: String,
        name: String,
    },

    #[error("[{stage}] {message}")]
    Config {
        stage: Stage,
        name: String,
        message: String,
    },

    #[error("[{stage}] {error:#}")]
    Stage { stage: Stage, error: anyhow::Error },

    #[error("Failed to create workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    /// Stage the run stopped at, if it got that far
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Unsupported { stage, .. }
            | PipelineError::Config { stage, .. }
            | PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

fn stage_err(stage: Stage) -> impl FnOnce(anyhow::Error) -> PipelineError {
    move |error| PipelineError::Stage { stage, error }
}

fn config_err(stage: Stage, entry: &SubConfig) -> impl FnOnce(anyhow::Error) -> PipelineError + '_ {
    move |e| PipelineError::Config {
        stage,
        name: entry.label().to_string(),
        message: format!("{:#}", e),
    }
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub model: String,
    pub duration: Duration,
    /// Primary remote key of the uploaded artifact
    pub key: String,
    /// Storage entries that received it, in order
    pub storages: Vec<String>,
    /// Packages pruned by retention across all storages
    pub expired: usize,
}

/// Open storage session; `close` runs when it goes out of scope
struct Session {
    storage: Box<dyn Storage>,
}

impl Session {
    fn open(storage: Box<dyn Storage>) -> anyhow::Result<Self> {
        let mut session = Self { storage };
        session.storage.open()?;
        Ok(session)
    }
}

impl Deref for Session {
    type Target = dyn Storage;

    fn deref(&self) -> &Self::Target {
        self.storage.as_ref()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.storage.close();
    }
}

pub struct PipelineManager {
    registries: Arc<Registries>,
    executor: Arc<dyn CommandExecutor>,
    models: BTreeMap<String, ModelConfig>,
}

impl PipelineManager {
    pub fn new(
        registries: Arc<Registries>,
        executor: Arc<dyn CommandExecutor>,
        models: BTreeMap<String, ModelConfig>,
    ) -> Self {
        Self {
            registries,
            executor,
            models,
        }
    }

    pub fn from_config(
        config: &Config,
        registries: Arc<Registries>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self::new(registries, executor, crate::config::resolve_all_models(config))
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Configured models, by name
    pub fn list_models(&self) -> &BTreeMap<String, ModelConfig> {
        &self.models
    }

    pub fn model(&self, name: &str) -> Result<&ModelConfig, PipelineError> {
        self.models
            .get(name)
            .ok_or_else(|| PipelineError::ModelNotFound(name.to_string()))
    }

    /// Run one model now
    pub fn perform(&self, name: &str) -> Result<RunReport, PipelineError> {
        let model = self.model(name)?;
        if !model.enabled {
            info!("Model '{}' is disabled, skipping", name);
            return Err(PipelineError::Disabled(name.to_string()));
        }
        self.perform_model(model)
    }

    /// Run every enabled model, one after another
    pub fn perform_all(&self) -> Vec<(String, Result<RunReport, PipelineError>)> {
        self.models
            .values()
            .filter(|model| model.enabled)
            .map(|model| (model.name.clone(), self.perform_model(model)))
            .collect()
    }

    /// Full pipeline for `model`.
    ///
    /// A busy model is rejected before anything runs and without notifying.
    pub fn perform_model(&self, model: &ModelConfig) -> Result<RunReport, PipelineError> {
        let span = info_span!("model", name = %model.name);
        let _enter = span.enter();

        let lock_dir = model.state_directory.join("locks");
        let _lock = BackupLock::acquire(&lock_dir, &model.name).map_err(|e| {
            warn!("{:#}", e);
            PipelineError::Busy(format!("{:#}", e))
        })?;

        let started = Instant::now();
        let started_at = Local::now();
        let notifications = NotificationManager::for_model(&self.registries, model);

        info!("======== {} ========", model.name);

        let workspace = match Workspace::create(&model.workspace, &model.name) {
            Ok(workspace) => workspace,
            Err(e) => {
                let err = PipelineError::Workspace(e);
                error!("{}", err);
                notifications.send_failure(started.elapsed(), &err.to_string());
                return Err(err);
            }
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_stages(model, &workspace, started_at)
        }))
        .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(payload))));

        let duration = started.elapsed();
        match &result {
            Ok(_) => {
                info!("======= End {} =======", model.name);
                notifications.send_success(duration);
            }
            Err(e) => {
                error!("Backup of '{}' failed: {}", model.name, e);
                notifications.send_failure(duration, &e.to_string());
            }
        }

        drop(workspace);

        result.map(|(key, storages, expired)| RunReport {
            model: model.name.clone(),
            duration,
            key,
            storages,
            expired,
        })
    }

    fn run_stages(
        &self,
        model: &ModelConfig,
        workspace: &Workspace,
        started_at: DateTime<Local>,
    ) -> Result<(String, Vec<String>, usize), PipelineError> {
        let env = StageEnv {
            executor: self.executor.as_ref(),
            timeout: model.timeout,
        };

        self.dump_databases(model, workspace)?;

        match model.archive.as_ref().filter(|a| a.has_rules()) {
            Some(rules) => {
                info!("--> {}", Stage::Archive);
                archive::run(rules, workspace.dump_path(), &env).map_err(stage_err(Stage::Archive))?;
            }
            None => debug!("No archive rules, skipping archive"),
        }

        info!("--> {}", Stage::Compress);
        let mut file = compressor::run(&model.compress_with, workspace, started_at, &env)
            .map_err(stage_err(Stage::Compress))?;

        if let Some(encrypt) = &model.encrypt_with {
            if !encryptor::supported_types().contains(&encrypt.kind.as_str()) {
                return Err(PipelineError::Unsupported {
                    stage: Stage::Encrypt,
                    kind: "encryptor",
                    type_name: encrypt.kind.clone(),
                    name: encrypt.label().to_string(),
                });
            }
            info!("--> {}", Stage::Encrypt);
            file = encryptor::run(encrypt, file, &env).map_err(stage_err(Stage::Encrypt))?;
        }

        let artifact = match &model.split_with {
            Some(split) => {
                info!("--> {}", Stage::Split);
                splitter::run(split, file, &env).map_err(stage_err(Stage::Split))?
            }
            None => Artifact::File(file.path),
        };

        let (storages, expired) = self.store_all(model, &artifact)?;
        Ok((artifact.key(), storages, expired))
    }

    /// Dump sources in order; the first failure stops the rest
    fn dump_databases(&self, model: &ModelConfig, workspace: &Workspace) -> Result<(), PipelineError> {
        for db in &model.databases {
            let factory = self.registries.databases.get(&db.kind).ok_or_else(|| {
                PipelineError::Unsupported {
                    stage: Stage::Dump,
                    kind: "database",
                    type_name: db.kind.clone(),
                    name: db.label().to_string(),
                }
            })?;

            let dump_path = workspace.dump_path().join(&db.kind).join(db.label());
            fs::create_dir_all(&dump_path).map_err(|e| PipelineError::Stage {
                stage: Stage::Dump,
                error: anyhow::Error::new(e)
                    .context(format!("Failed to create {}", dump_path.display())),
            })?;

            let database = factory(DatabaseContext {
                model: model.name.clone(),
                config: db.clone(),
                dump_path,
                timeout: model.timeout,
                executor: Arc::clone(&self.executor),
            })
            .map_err(config_err(Stage::Dump, db))?;

            info!("--> {} | {}: {}", Stage::Dump, db.kind, db.label());
            database
                .perform()
                .map_err(|e| e.context(format!("database '{}'", db.label())))
                .map_err(stage_err(Stage::Dump))?;
        }
        Ok(())
    }

    /// Upload to every storage in order, pruning each one's history after
    /// its upload. Any failure aborts the run.
    fn store_all(
        &self,
        model: &ModelConfig,
        artifact: &Artifact,
    ) -> Result<(Vec<String>, usize), PipelineError> {
        let mut stored = Vec::new();
        let mut expired = 0;

        for config in &model.storages {
            let options: StorageOptions =
                adapter_options(config).map_err(config_err(Stage::Store, config))?;
            let session = self.open_session(model, config, &options)?;

            info!("--> {} | {}: {}", Stage::Store, config.kind, config.label());
            session
                .upload(artifact)
                .map_err(|e| e.context(format!("upload to '{}'", config.label())))
                .map_err(stage_err(Stage::Store))?;

            let mut cycler = Cycler::new(ledger_path(
                &model.state_directory,
                &model.name,
                config.label(),
            ));
            let removed = cycler.run(
                &artifact.key(),
                &artifact.secondary_keys(),
                options.keep,
                |key| session.delete(key),
            );

            expired += removed.len();
            stored.push(config.label().to_string());
        }

        Ok((stored, expired))
    }

    fn open_session(
        &self,
        model: &ModelConfig,
        config: &SubConfig,
        options: &StorageOptions,
    ) -> Result<Session, PipelineError> {
        let factory = self.registries.storages.get(&config.kind).ok_or_else(|| {
            PipelineError::Unsupported {
                stage: Stage::Store,
                kind: "storage",
                type_name: config.kind.clone(),
                name: config.label().to_string(),
            }
        })?;

        let storage = factory(StorageContext {
            model: model.name.clone(),
            config: config.clone(),
            timeout: options
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(model.timeout),
            executor: Arc::clone(&self.executor),
        })
        .map_err(config_err(Stage::Store, config))?;

        Session::open(storage)
            .map_err(|e| e.context(format!("open storage '{}'", config.label())))
            .map_err(stage_err(Stage::Store))
    }

    /// Open one storage of a model and hand it to `f`; closed afterwards
    pub fn with_storage<T>(
        &self,
        model: &str,
        storage: &str,
        f: impl FnOnce(&dyn Storage) -> anyhow::Result<T>,
    ) -> Result<T, PipelineError> {
        let model = self.model(model)?;
        let config = find_storage(model, storage)?;
        let options: StorageOptions =
            adapter_options(config).map_err(config_err(Stage::Store, config))?;

        let session = self.open_session(model, config, &options)?;
        f(&*session).map_err(stage_err(Stage::Store))
    }

    /// Retention ledger of one (model, storage) pair, oldest first
    pub fn packages(&self, model: &str, storage: &str) -> Result<Vec<Package>, PipelineError> {
        let model = self.model(model)?;
        let config = find_storage(model, storage)?;

        let mut cycler = Cycler::new(ledger_path(
            &model.state_directory,
            &model.name,
            config.label(),
        ));
        cycler
            .load()
            .map_err(|e| stage_err(Stage::Store)(anyhow::Error::new(e)))?;
        Ok(cycler.packages().to_vec())
    }
}

fn find_storage<'a>(model: &'a ModelConfig, name: &str) -> Result<&'a SubConfig, PipelineError> {
    model
        .storages
        .iter()
        .find(|s| s.label() == name)
        .ok_or_else(|| PipelineError::Config {
            stage: Stage::Store,
            name: name.to_string(),
            message: format!("model '{}' has no storage named '{}'", model.name, name),
        })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
