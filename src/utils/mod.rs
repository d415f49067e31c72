pub mod command;
pub mod cron;
pub mod duration;
pub mod locker;

// Trait-based abstraction for testability
pub mod executor;

// Re-export commonly used types and traits (used by test crate)
pub use command::CommandSpec;
pub use executor::{CommandExecutor, RealExecutor};
