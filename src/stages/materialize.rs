//! Materializer: rebuild the partitioned, clustered native table

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::warehouse::{JobSummary, Materialization, Warehouse};
use tracing::info;

pub fn materialization(config: &PipelineConfig) -> Materialization {
    Materialization::trips(config.optimized_table(), config.external_table())
}

/// Replace the optimized table from the external table and wait for the job
pub async fn materialize(config: &PipelineConfig, warehouse: &dyn Warehouse) -> Result<JobSummary> {
    let job = materialization(config);
    info!(target_table = %job.target, source = %job.source, "Materializing");

    let summary = warehouse.replace_table_as_select(&job).await?;
    info!(
        job_id = %summary.job_id,
        rows = ?summary.rows,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Materialized"
    );
    Ok(summary)
}
