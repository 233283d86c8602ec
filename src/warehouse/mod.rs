//! Warehouse module
//!
//! The catalog registrar and materializer talk to the warehouse through the
//! [`Warehouse`] trait. Two backends exist:
//!
//! - [`BigQueryWarehouse`]: BigQuery REST v2 (`tables.*` and `jobs.*`)
//! - [`DuckDbWarehouse`]: a local DuckDB file, for development and offline tests

mod bigquery;
mod duckdb;
mod types;

pub use self::bigquery::BigQueryWarehouse;
pub use self::duckdb::DuckDbWarehouse;
pub use types::{
    ExternalTableDefinition, JobSummary, Materialization, Partitioning, SourceFormat, TableInfo,
    TableKind,
};

use crate::auth::AuthConfig;
use crate::config::{PipelineConfig, TableRef};
use crate::error::Result;
use crate::types::WarehouseBackend;
use async_trait::async_trait;
use std::sync::Arc;

/// Catalog and query operations the pipeline needs from a warehouse
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Backend label for logs
    fn name(&self) -> &'static str;

    /// Create the external table, replacing an existing external table of the
    /// same name. Fails with `Error::Catalog` if the name is bound to anything
    /// other than an external table or the definition is rejected.
    async fn create_external_table(&self, definition: &ExternalTableDefinition) -> Result<()>;

    /// Run the materialization and wait for it to finish
    async fn replace_table_as_select(&self, materialization: &Materialization)
        -> Result<JobSummary>;

    /// Catalog metadata, or `None` if the table does not exist
    async fn table_info(&self, table: &TableRef) -> Result<Option<TableInfo>>;
}

/// Build the configured warehouse backend
pub fn from_config(config: &PipelineConfig) -> Result<Arc<dyn Warehouse>> {
    match config.warehouse.backend {
        WarehouseBackend::BigQuery => {
            let auth = AuthConfig::from_env()?;
            Ok(Arc::new(BigQueryWarehouse::new(config, auth)?))
        }
        WarehouseBackend::DuckDb => Ok(Arc::new(DuckDbWarehouse::open(
            &config.warehouse.duckdb_path,
        )?)),
    }
}
