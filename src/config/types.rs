use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub models: BTreeMap<String, ModelSection>,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Root directory for per-run temporary workspaces
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Directory holding retention ledgers and lock files
    #[serde(default = "default_state_directory")]
    pub state_directory: PathBuf,

    /// Timeout applied to every external operation unless overridden
    #[serde(default = "default_timeout")]
    pub default_timeout_seconds: u64,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            state_directory: default_state_directory(),
            default_timeout_seconds: default_timeout(),
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
        }
    }
}

/// One backup job as written in the config file (before resolution)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelSection {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Timeout override for this model's external operations
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// Database sources, dumped in order
    #[serde(default)]
    pub databases: Vec<SubConfig>,

    #[serde(default)]
    pub archive: Option<ArchiveConfig>,

    #[serde(default)]
    pub compress_with: CompressConfig,

    #[serde(default)]
    pub encrypt_with: Option<SubConfig>,

    #[serde(default)]
    pub split_with: Option<SplitConfig>,

    /// Upload destinations, attempted in order
    #[serde(default)]
    pub storages: Vec<SubConfig>,

    #[serde(default)]
    pub notifiers: Vec<SubConfig>,
}

/// A named, typed configuration fragment.
///
/// Every key besides `name` and `type` is kept in `settings`; adapters
/// deserialize their own typed options from it with [`SubConfig::settings_as`].
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SubConfig {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(flatten)]
    pub settings: toml::Table,
}

impl SubConfig {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            settings: toml::Table::new(),
        }
    }

    /// Builder-style setter, mostly useful in tests
    pub fn with(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    /// Deserialize the adapter-specific options
    pub fn settings_as<T: DeserializeOwned>(&self) -> Result<T, toml::de::Error> {
        toml::Value::Table(self.settings.clone()).try_into()
    }

    /// Name used in logs: the configured name, or the type when unnamed
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.kind
        } else {
            &self.name
        }
    }
}

/// File tree archive rules
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl ArchiveConfig {
    /// No rules means the archive stage is skipped
    pub fn has_rules(&self) -> bool {
        !self.includes.is_empty() || !self.excludes.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CompressConfig {
    #[serde(rename = "type", default)]
    pub format: CompressFormat,

    /// Use a parallel compressor (pigz, pbzip2, ...) when one is installed
    #[serde(default)]
    pub parallel: bool,
}

/// Supported tar compression formats
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum CompressFormat {
    #[default]
    #[serde(rename = "tar")]
    Tar,
    #[serde(rename = "tgz", alias = "gz", alias = "taz", alias = "tar.gz")]
    Gzip,
    #[serde(rename = "tar.Z", alias = "Z", alias = "taZ")]
    Compress,
    #[serde(rename = "tbz2", alias = "bz2", alias = "tbz", alias = "tar.bz2")]
    Bzip2,
    #[serde(rename = "tar.lz", alias = "lz")]
    Lzip,
    #[serde(rename = "tar.lzma", alias = "lzma", alias = "tlz")]
    Lzma,
    #[serde(rename = "tar.lzo", alias = "lzo")]
    Lzop,
    #[serde(rename = "txz", alias = "xz", alias = "tar.xz")]
    Xz,
    #[serde(rename = "tzst", alias = "zst", alias = "tar.zst")]
    Zstd,
}

impl CompressFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            CompressFormat::Tar => ".tar",
            CompressFormat::Gzip => ".tar.gz",
            CompressFormat::Compress => ".tar.Z",
            CompressFormat::Bzip2 => ".tar.bz2",
            CompressFormat::Lzip => ".tar.lz",
            CompressFormat::Lzma => ".tar.lzma",
            CompressFormat::Lzop => ".tar.lzo",
            CompressFormat::Xz => ".tar.xz",
            CompressFormat::Zstd => ".tar.zst",
        }
    }

    /// tar flag selecting the built-in filter
    pub fn tar_flag(&self) -> Option<&'static str> {
        match self {
            CompressFormat::Tar => None,
            CompressFormat::Gzip => Some("-z"),
            CompressFormat::Compress => Some("-Z"),
            CompressFormat::Bzip2 => Some("-j"),
            CompressFormat::Lzip => Some("--lzip"),
            CompressFormat::Lzma => Some("--lzma"),
            CompressFormat::Lzop => Some("--lzop"),
            CompressFormat::Xz => Some("-J"),
            CompressFormat::Zstd => Some("--zstd"),
        }
    }

    /// Multi-threaded drop-in replacement for the filter, if one exists
    pub fn parallel_program(&self) -> Option<&'static str> {
        match self {
            CompressFormat::Gzip => Some("pigz"),
            CompressFormat::Bzip2 => Some("pbzip2"),
            CompressFormat::Xz => Some("pixz"),
            CompressFormat::Zstd => Some("zstdmt"),
            _ => None,
        }
    }
}

/// Chunking of the final archive
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SplitConfig {
    /// Size accepted by `split -b`, e.g. "512M"
    pub chunk_size: String,
    #[serde(default = "default_suffix_length")]
    pub suffix_length: u32,
    #[serde(default = "default_numeric_suffixes")]
    pub numeric_suffixes: bool,
}

/// When a model runs on its own
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// 5-field cron expression, installed into the system crontab by `setup`
    #[serde(default)]
    pub cron: Option<String>,

    /// Interval for the in-process scheduler, e.g. "1day", "6h"
    #[serde(default)]
    pub every: Option<String>,

    /// Wall-clock start time ("HH:MM") for `every` schedules
    #[serde(default)]
    pub at: Option<String>,
}

impl ScheduleConfig {
    pub fn is_enabled(&self) -> bool {
        self.cron.is_some() || self.every.is_some()
    }
}

impl std::fmt::Display for ScheduleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.cron, &self.every, &self.at) {
            (Some(cron), _, _) => write!(f, "cron {}", cron),
            (None, Some(every), Some(at)) => write!(f, "every {} at {}", every, at),
            (None, Some(every), None) => write!(f, "every {}", every),
            (None, None, _) => write!(f, "manual"),
        }
    }
}

/// Resolved model configuration (after merging global defaults).
/// Read-only to the pipeline.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub name: String,
    pub enabled: bool,
    pub description: String,
    pub schedule: ScheduleConfig,
    pub timeout: Duration,
    /// Root under which each run creates its own temporary directory
    pub workspace: PathBuf,
    pub state_directory: PathBuf,
    pub databases: Vec<SubConfig>,
    pub archive: Option<ArchiveConfig>,
    pub compress_with: CompressConfig,
    pub encrypt_with: Option<SubConfig>,
    pub split_with: Option<SplitConfig>,
    pub storages: Vec<SubConfig>,
    pub notifiers: Vec<SubConfig>,
}

// Default value functions

fn default_workspace() -> PathBuf { std::env::temp_dir().join("packvault") }
fn default_state_directory() -> PathBuf { PathBuf::from("~/.packvault") }
fn default_timeout() -> u64 { 3600 }
fn default_log_directory() -> PathBuf { PathBuf::from("~/.packvault/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_enabled() -> bool { true }
fn default_suffix_length() -> u32 { 3 }
fn default_numeric_suffixes() -> bool { true }
