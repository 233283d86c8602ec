//! Fixtures shared by unit tests

use crate::schema::{yellow_trip_schema, FieldType, FARE_COLUMN};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// 2023-01-01T00:00:00Z in microseconds
const JAN_FIRST_MICROS: i64 = 1_672_531_200_000_000;
const DAY_MICROS: i64 = 86_400_000_000;

/// A trip batch with one row per fare; rows spread over the first days of January 2023
pub fn trip_batch(fares: &[Option<f64>]) -> RecordBatch {
    let schema = yellow_trip_schema();
    let n = fares.len();
    let columns: Vec<ArrayRef> = schema
        .fields
        .iter()
        .map(|field| -> ArrayRef {
            match field.field_type {
                FieldType::Float if field.name == FARE_COLUMN => {
                    Arc::new(Float64Array::from(fares.to_vec()))
                }
                FieldType::Float => Arc::new(Float64Array::from(vec![1.5; n])),
                FieldType::Integer => {
                    Arc::new(Int64Array::from((0..n as i64).map(|i| i % 3 + 1).collect::<Vec<_>>()))
                }
                FieldType::String => Arc::new(StringArray::from(vec!["N"; n])),
                FieldType::Timestamp => Arc::new(TimestampMicrosecondArray::from(
                    (0..n as i64)
                        .map(|i| JAN_FIRST_MICROS + (i % 5) * DAY_MICROS)
                        .collect::<Vec<_>>(),
                )),
            }
        })
        .collect();

    RecordBatch::try_new(Arc::new(schema.to_arrow()), columns).unwrap()
}

/// Write a trip batch as a Parquet file
pub fn write_trip_parquet(path: &Path, fares: &[Option<f64>]) {
    let batch = trip_batch(fares);
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

/// Encode a trip batch as Parquet bytes, as served by the source endpoint
pub fn trip_parquet_bytes(fares: &[Option<f64>]) -> Vec<u8> {
    let batch = trip_batch(fares);
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    buf
}
