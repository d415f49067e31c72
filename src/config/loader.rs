use super::types::*;
use crate::utils::{cron, duration};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Model '{0}' not found")]
    ModelNotFound(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.models.is_empty() {
        return Err(ConfigError::ValidationError("No models defined".to_string()));
    }

    for (name, model) in &config.models {
        validate_model(name, model)?;
    }

    Ok(())
}

fn validate_model(name: &str, model: &ModelSection) -> Result<()> {
    if !is_safe_name(name) {
        return Err(ConfigError::ValidationError(format!(
            "Model '{}': name may only contain letters, digits, '-', '_' and '.'",
            name
        )));
    }

    if model.storages.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Model '{}': at least one storage is required",
            name
        )));
    }

    validate_sub_configs(name, "databases", &model.databases)?;
    validate_sub_configs(name, "storages", &model.storages)?;
    validate_sub_configs(name, "notifiers", &model.notifiers)?;

    if let Some(ref encrypt) = model.encrypt_with {
        if encrypt.kind.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Model '{}': encrypt_with.type is required",
                name
            )));
        }
    }

    if let Some(ref archive) = model.archive {
        if archive.includes.is_empty() && !archive.excludes.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Model '{}': archive.excludes given but archive.includes is empty",
                name
            )));
        }
    }

    if let Some(ref split) = model.split_with {
        if split.chunk_size.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Model '{}': split_with.chunk_size is required",
                name
            )));
        }
    }

    validate_schedule(name, &model.schedule)
}

fn validate_sub_configs(model: &str, section: &str, subs: &[SubConfig]) -> Result<()> {
    let mut seen = HashSet::new();

    for sub in subs {
        if sub.name.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Model '{}': every entry in {} needs a name",
                model, section
            )));
        }
        if !is_safe_name(&sub.name) {
            return Err(ConfigError::ValidationError(format!(
                "Model '{}': {} entry '{}' has an invalid name",
                model, section, sub.name
            )));
        }
        if sub.kind.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Model '{}': {} entry '{}' has no type",
                model, section, sub.name
            )));
        }
        if !seen.insert(sub.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Model '{}': duplicate {} entry '{}'",
                model, section, sub.name
            )));
        }
    }

    Ok(())
}

fn validate_schedule(model: &str, schedule: &ScheduleConfig) -> Result<()> {
    if schedule.cron.is_some() && schedule.every.is_some() {
        return Err(ConfigError::ValidationError(format!(
            "Model '{}': schedule.cron and schedule.every are mutually exclusive",
            model
        )));
    }

    if let Some(ref expr) = schedule.cron {
        if !cron::validate_cron_schedule(expr) {
            return Err(ConfigError::ValidationError(format!(
                "Model '{}': invalid cron schedule format (expected 5 fields): {}",
                model, expr
            )));
        }
    }

    if let Some(ref every) = schedule.every {
        duration::parse_duration(every).map_err(|e| {
            ConfigError::ValidationError(format!("Model '{}': schedule.every: {}", model, e))
        })?;
    }

    if let Some(ref at) = schedule.at {
        if schedule.every.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "Model '{}': schedule.at requires schedule.every",
                model
            )));
        }
        duration::parse_time_of_day(at).map_err(|e| {
            ConfigError::ValidationError(format!("Model '{}': schedule.at: {}", model, e))
        })?;
    }

    Ok(())
}

/// Names end up in file names (ledgers, locks, temp dirs)
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Resolve a model section by merging it with the global defaults
pub fn resolve_model(name: &str, model: &ModelSection, global: &GlobalConfig) -> ModelConfig {
    let timeout_seconds = model
        .timeout_seconds
        .unwrap_or(global.default_timeout_seconds);

    ModelConfig {
        name: name.to_string(),
        enabled: model.enabled,
        description: model.description.clone(),
        schedule: model.schedule.clone(),
        timeout: Duration::from_secs(timeout_seconds),
        workspace: super::expand_tilde(&global.workspace),
        state_directory: super::expand_tilde(&global.state_directory),
        databases: model.databases.clone(),
        archive: model.archive.clone(),
        compress_with: model.compress_with.clone(),
        encrypt_with: model.encrypt_with.clone(),
        split_with: model.split_with.clone(),
        storages: model.storages.clone(),
        notifiers: model.notifiers.clone(),
    }
}

/// Resolve all models in the configuration
pub fn resolve_all_models(config: &Config) -> BTreeMap<String, ModelConfig> {
    config
        .models
        .iter()
        .map(|(name, model)| (name.clone(), resolve_model(name, model, &config.global)))
        .collect()
}

/// Resolve a single model by name
pub fn find_model(config: &Config, name: &str) -> Result<ModelConfig> {
    config
        .models
        .get(name)
        .map(|model| resolve_model(name, model, &config.global))
        .ok_or_else(|| ConfigError::ModelNotFound(name.to_string()))
}
