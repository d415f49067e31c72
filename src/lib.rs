//! packvault library
//!
//! Runs backup models: dump databases, archive files, compress, encrypt and
//! split the result, upload it to every configured storage, prune old uploads
//! and notify about the outcome. Backends are looked up by type name in
//! registries built once at start-up.

pub mod backends;
pub mod config;
pub mod managers;
pub mod registry;
pub mod stages;
pub mod utils;

// Re-export commonly used types
pub use backends::Registries;
pub use config::{load_config, resolve_all_models, Config, ModelConfig};
pub use managers::cycler::{Cycler, Package};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::model::{PipelineError, PipelineManager, RunReport, Stage};
pub use managers::notification::NotificationManager;
pub use registry::{Registry, RegistryError};
