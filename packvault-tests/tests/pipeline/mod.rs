//! Pipeline tests for packvault
//!
//! Whole model runs over the mock backends and a recording command executor.
//! No external tools are needed.

mod retention;
mod scenarios;
