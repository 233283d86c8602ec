//! Catalog registrar: declare the external table over the staged objects

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::schema::yellow_trip_schema;
use crate::warehouse::{ExternalTableDefinition, Warehouse};
use tracing::info;

/// External table definition for the configured periods
pub fn external_definition(config: &PipelineConfig) -> ExternalTableDefinition {
    ExternalTableDefinition::parquet(
        config.external_table(),
        yellow_trip_schema(),
        config.staged_uris(),
    )
}

/// Create or replace the external table
pub async fn register(
    config: &PipelineConfig,
    warehouse: &dyn Warehouse,
) -> Result<ExternalTableDefinition> {
    let definition = external_definition(config);
    info!(
        table = %definition.table,
        backend = warehouse.name(),
        uris = definition.source_uris.len(),
        "Registering external table"
    );
    warehouse.create_external_table(&definition).await?;
    Ok(definition)
}
