//! Shared fixtures for integration tests

#![allow(dead_code)]

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::record_batch::RecordBatch;
use nyc_taxi_pipeline::schema::{yellow_trip_schema, FieldType, FARE_COLUMN};
use nyc_taxi_pipeline::PipelineConfig;
use parquet::arrow::ArrowWriter;
use std::path::Path;
use std::sync::Arc;

/// 2023-01-01T00:00:00Z in microseconds
const JAN_FIRST_MICROS: i64 = 1_672_531_200_000_000;
const HOUR_MICROS: i64 = 3_600_000_000;

/// Ten January trips, two of them with a negative fare
pub const JANUARY_FARES: [f64; 10] = [10.0, -2.5, 7.0, 15.25, 3.5, -40.0, 0.0, 22.0, 8.75, 5.0];

/// Parquet bytes of a trip file with the given fares
pub fn trip_parquet(fares: &[f64]) -> Vec<u8> {
    let schema = yellow_trip_schema();
    let n = fares.len() as i64;
    let columns: Vec<ArrayRef> = schema
        .fields
        .iter()
        .map(|field| -> ArrayRef {
            match field.field_type {
                FieldType::Float if field.name == FARE_COLUMN => {
                    Arc::new(Float64Array::from(fares.to_vec()))
                }
                FieldType::Float => Arc::new(Float64Array::from(vec![2.0; fares.len()])),
                FieldType::Integer => Arc::new(Int64Array::from((0..n).map(|i| 100 + i % 4).collect::<Vec<_>>())),
                FieldType::String => Arc::new(StringArray::from(vec!["N"; fares.len()])),
                FieldType::Timestamp => Arc::new(TimestampMicrosecondArray::from(
                    (0..n).map(|i| JAN_FIRST_MICROS + i * 7 * HOUR_MICROS).collect::<Vec<_>>(),
                )),
            }
        })
        .collect();

    let batch = RecordBatch::try_new(Arc::new(schema.to_arrow()), columns).unwrap();
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    buf
}

/// Offline configuration: mock source, local staging, DuckDB warehouse
pub fn offline_config(source_url: &str, root: &Path, periods: &[&str]) -> PipelineConfig {
    let yaml = format!(
        r#"
project_id: nyc-taxi-project-12345
scratch_dir: {scratch}
periods: [{periods}]
source:
  base_url: {source_url}/trip-data
staging:
  url: {lake}
warehouse:
  backend: duckdb
  duckdb_path: {db}
retry:
  retries: 1
  delay_secs: 0
"#,
        scratch = root.join("scratch").display(),
        lake = root.join("lake").display(),
        db = root.join("warehouse.duckdb").display(),
        periods = periods
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect::<Vec<_>>()
            .join(", "),
    );
    let config = PipelineConfig::from_yaml_str(&yaml).unwrap();
    config.validate().unwrap();
    config
}
