//! Trip schema module
//!
//! The static, versioned column descriptor shared by the cleaner, the
//! catalog registrar and the materializer.
//!
//! # Overview
//!
//! - `FieldType` - Warehouse column types with BigQuery, DuckDB and Arrow mappings
//! - `TableSchema` - Ordered list of (name, type) pairs
//! - `yellow_trip_schema()` - The 18-column yellow taxi trip layout

mod trips;
mod types;

pub use trips::{
    yellow_trip_schema, CLUSTER_COLUMN, FARE_COLUMN, PARTITION_COLUMN, YELLOW_TRIP_SCHEMA_VERSION,
};
pub use types::{FieldType, SchemaField, TableSchema};

#[cfg(test)]
mod tests;
