//! Command-line interface for workerscope.
//!
//! Provides commands for serving the introspection endpoints and for one-shot
//! stats reports and identifier lookups.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands};
