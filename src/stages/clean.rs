//! Cleaner: drop trips with a negative fare
//!
//! Parquet decoding runs on the blocking pool. A row survives only if
//! `fare_amount >= 0`; null and NaN fares are dropped.

use super::fetch::ScratchLocation;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::output::{ParquetWriter, ParquetWriterConfig};
use crate::schema::{yellow_trip_schema, TableSchema, FARE_COLUMN};
use crate::types::Period;
use arrow::array::{Array, BooleanArray, Float64Array};
use arrow::compute::{cast, filter_record_batch};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Row counts for one cleaned period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub period: Period,
    pub raw_path: PathBuf,
    pub processed_path: PathBuf,
    pub raw_rows: usize,
    pub cleaned_rows: usize,
}

impl CleanReport {
    pub fn dropped_rows(&self) -> usize {
        self.raw_rows - self.cleaned_rows
    }
}

/// Clean every configured period found in the scratch location
pub async fn clean(config: &PipelineConfig, scratch: &ScratchLocation) -> Result<Vec<CleanReport>> {
    let mut reports = Vec::with_capacity(config.periods.len());

    for period in &config.periods {
        let raw_path = config.raw_path(&scratch.dir, period);
        let processed_path = config.processed_path(&scratch.dir, period);

        let (raw, processed) = (raw_path.clone(), processed_path.clone());
        let (raw_rows, cleaned_rows) = tokio::task::spawn_blocking(move || {
            clean_file(&raw, &processed, &yellow_trip_schema())
        })
        .await
        .map_err(|e| Error::Other(format!("cleaner worker failed: {e}")))??;

        info!(
            period = %period,
            raw_rows,
            cleaned_rows,
            dropped = raw_rows - cleaned_rows,
            "Cleaned"
        );

        reports.push(CleanReport {
            period: *period,
            raw_path,
            processed_path,
            raw_rows,
            cleaned_rows,
        });
    }

    Ok(reports)
}

/// Keep rows with a non-negative fare; returns (raw rows, kept rows)
pub fn clean_file(raw: &Path, processed: &Path, expected: &TableSchema) -> Result<(usize, usize)> {
    let path_label = raw.display().to_string();

    let file = File::open(raw).map_err(|e| Error::malformed(&path_label, e.to_string()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::malformed(&path_label, e.to_string()))?;
    let schema = builder.schema().clone();

    let fare_index = schema
        .index_of(FARE_COLUMN)
        .map_err(|_| Error::schema_mismatch(&path_label, format!("column '{FARE_COLUMN}' not found")))?;
    let fare_type = schema.field(fare_index).data_type();
    if !fare_type.is_numeric() {
        return Err(Error::schema_mismatch(
            &path_label,
            format!("column '{FARE_COLUMN}' has non-numeric type {fare_type}"),
        ));
    }

    let missing: Vec<&str> = expected
        .names()
        .into_iter()
        .filter(|name| schema.index_of(name).is_err())
        .collect();
    if !missing.is_empty() {
        warn!("{} is missing columns: {}", path_label, missing.join(", "));
    }

    let reader = builder
        .build()
        .map_err(|e| Error::malformed(&path_label, e.to_string()))?;
    let mut writer = ParquetWriter::new(processed, schema, &ParquetWriterConfig::default())?;
    let mut raw_rows = 0;

    for batch in reader {
        let batch = batch.map_err(|e| Error::malformed(&path_label, e.to_string()))?;
        raw_rows += batch.num_rows();

        let fares = cast(batch.column(fare_index), &DataType::Float64)?;
        let fares = fares
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| Error::schema_mismatch(&path_label, "fare column did not cast to FLOAT"))?;

        let keep: BooleanArray = fares
            .iter()
            .map(|fare| Some(matches!(fare, Some(x) if x >= 0.0)))
            .collect();

        writer.write(&filter_record_batch(&batch, &keep)?)?;
    }

    let cleaned_rows = writer.close()?;
    Ok((raw_rows, cleaned_rows))
}
