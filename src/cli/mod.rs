//! CLI module
//!
//! Command-line interface for the pipeline.
//!
//! # Commands
//!
//! - `run` - Run the pipeline once
//! - `schedule` - Run once per interval until interrupted
//! - `plan` - Show what a run would touch
//! - `inspect` - Show warehouse table metadata

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
