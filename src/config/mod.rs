//! Configuration module for packvault
//!
//! This module handles loading, validating, and resolving configuration from TOML files.
//!
//! ## Resolution
//!
//! Each `[models.<name>]` section is merged with `[global]` into an immutable
//! [`ModelConfig`]. Databases, storages, notifiers and the encryptor are kept as
//! [`SubConfig`] fragments; their adapter-specific keys are only interpreted
//! when the adapter is built.
//!
//! ## Example Usage
//!
//! ```no_run
//! use packvault::config;
//!
//! let config = config::load_config("packvault.toml")?;
//! let models = config::resolve_all_models(&config);
//!
//! for (name, model) in models {
//!     println!("Model: {}, storages: {}", name, model.storages.len());
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{
    find_model, load_config, parse_config, resolve_all_models, resolve_model, ConfigError, Result,
};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_expand_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_tilde(&path);
        assert!(!expanded.starts_with("~"));

        let path = PathBuf::from("/absolute/path");
        let expanded = expand_tilde(&path);
        assert_eq!(expanded, path);
    }

    #[test]
    fn test_sub_config_settings_as() {
        #[derive(serde::Deserialize)]
        struct Opts {
            host: String,
            #[serde(default)]
            port: Option<u16>,
        }

        let sub = SubConfig::new("main", "postgresql")
            .with("host", "db.internal")
            .with("port", 5433);
        let opts: Opts = sub.settings_as().unwrap();
        assert_eq!(opts.host, "db.internal");
        assert_eq!(opts.port, Some(5433));

        let missing = SubConfig::new("main", "postgresql");
        assert!(missing.settings_as::<Opts>().is_err());
    }

    #[test]
    fn test_sub_config_label_falls_back_to_type() {
        assert_eq!(SubConfig::new("", "local").label(), "local");
        assert_eq!(SubConfig::new("disk", "local").label(), "disk");
    }

    #[test]
    fn test_schedule_display() {
        let schedule = ScheduleConfig {
            cron: None,
            every: Some("1day".to_string()),
            at: Some("04:00".to_string()),
        };
        assert_eq!(schedule.to_string(), "every 1day at 04:00");
        assert_eq!(ScheduleConfig::default().to_string(), "manual");
        assert!(!ScheduleConfig::default().is_enabled());
    }

    #[test]
    fn test_archive_rules() {
        assert!(!ArchiveConfig::default().has_rules());
        let archive = ArchiveConfig {
            includes: vec!["/etc".to_string()],
            excludes: vec![],
        };
        assert!(archive.has_rules());
    }
}
