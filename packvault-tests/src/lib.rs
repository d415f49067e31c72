//! Test utilities for packvault
//!
//! Shared builders, fixtures and a test harness that wires the pipeline to
//! in-memory backends and a recording command executor.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::from_builder(ConfigBuilder::minimal());
//!     let report = ctx.manager().perform("app").unwrap();
//!     assert_eq!(report.storages, vec!["disk"]);
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use packvault::backends::mock::MockBackends;
pub use packvault::backends::Registries;
pub use packvault::config::{
    ArchiveConfig, CompressConfig, CompressFormat, Config, GlobalConfig, ModelConfig,
    ModelSection, ScheduleConfig, SplitConfig, SubConfig,
};
pub use packvault::managers::cycler::{Cycler, Package};
pub use packvault::managers::model::{PipelineError, PipelineManager, Stage};
pub use packvault::utils::executor::mock::{MockExecutor, MockResponse};
pub use packvault::utils::CommandExecutor;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
