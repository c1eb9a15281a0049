//! CLI commands
//!
//! Command implementations for the `wib` binary.

mod batch;
pub mod logging;
mod progress;
pub mod style;

pub use batch::{BatchOptions, run_batch};
