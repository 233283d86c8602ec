//! CLI commands and argument parsing

use crate::types::WarehouseBackend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// NYC taxi trip batch pipeline
#[derive(Parser, Debug)]
#[command(name = "nyc-taxi-pipeline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline once
    Run {
        /// Warehouse backend (overrides config)
        #[arg(long)]
        warehouse: Option<WarehouseBackend>,

        /// Periods to process, comma-separated YYYY-MM (overrides config)
        #[arg(long)]
        periods: Option<String>,
    },

    /// Run the pipeline once per configured interval
    Schedule {
        /// Stop after this many runs
        #[arg(long)]
        max_runs: Option<u32>,

        /// Warehouse backend (overrides config)
        #[arg(long)]
        warehouse: Option<WarehouseBackend>,
    },

    /// Show derived URLs, paths, keys, tables and SQL without running anything
    Plan {
        /// Warehouse backend (overrides config)
        #[arg(long)]
        warehouse: Option<WarehouseBackend>,
    },

    /// Show catalog metadata of the external and optimized tables
    Inspect {
        /// Warehouse backend (overrides config)
        #[arg(long)]
        warehouse: Option<WarehouseBackend>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One JSON document per line
    Json,
    /// Indented JSON
    Pretty,
}
