// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # NYC Taxi Pipeline
//!
//! Daily batch pipeline that moves NYC TLC yellow-cab trip records from the
//! public monthly Parquet feed into a partitioned, clustered warehouse table.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nyc_taxi_pipeline::{engine::Pipeline, PipelineConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::load(None)?;
//!     let report = Pipeline::from_config(config)?.run().await;
//!     println!("{}", report.to_json());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────────┐
//! │ Fetcher  │ → │ Cleaner  │ → │  Stager  │ → │ Registrar │ → │ Materializer │
//! │ HTTP GET │   │ fare ≥ 0 │   │ obj store│   │ ext table │   │ CTAS, part.  │
//! └──────────┘   └──────────┘   └──────────┘   └───────────┘   └──────────────┘
//!       └──────────── Orchestrator: state machine, one retry per stage ───────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the pipeline
pub mod error;

/// Common types and type aliases
pub mod types;

/// Pipeline configuration and derived names
pub mod config;

/// Trip schema descriptor
pub mod schema;

/// Google OAuth authentication
pub mod auth;

/// HTTP client with retry
pub mod http;

/// Parquet writing and object storage
pub mod output;

/// Warehouse backends (BigQuery, DuckDB)
pub mod warehouse;

/// Fetch, clean, stage, register and materialize
pub mod stages;

/// Orchestrator state machine
pub mod engine;

/// Fixed-interval scheduler
pub mod scheduler;

/// Command-line interface
pub mod cli;

#[cfg(test)]
mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{PipelineConfig, TableRef};
pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
