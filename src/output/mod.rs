//! Output module
//!
//! Handles Parquet file writing and object storage destinations.
//!
//! # Overview
//!
//! - Writing Parquet files atomically (`.part` then rename)
//! - Staging destinations on GCS, S3, R2, Azure or the local filesystem

mod cloud;
mod writer;

pub use cloud::StagingDestination;
pub use writer::{partial_path, ParquetWriter, ParquetWriterConfig};
