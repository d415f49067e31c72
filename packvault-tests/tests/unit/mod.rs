//! Unit tests for packvault
//!
//! Configuration loading, registries and the retention cycler, exercised
//! through the public API.

mod config;
mod cycler;
mod registry;
