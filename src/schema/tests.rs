//! Tests for the schema module

use super::*;
use arrow::datatypes::{DataType, TimeUnit};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_yellow_trip_schema_layout() {
    let schema = yellow_trip_schema();
    assert_eq!(schema.len(), 18);
    assert_eq!(schema.version, YELLOW_TRIP_SCHEMA_VERSION);
    assert_eq!(schema.names()[0], "VendorID");
    assert_eq!(schema.names()[17], "congestion_surcharge");

    assert_eq!(schema.field(FARE_COLUMN).unwrap().field_type, FieldType::Float);
    assert_eq!(
        schema.field(PARTITION_COLUMN).unwrap().field_type,
        FieldType::Timestamp
    );
    assert_eq!(
        schema.field(CLUSTER_COLUMN).unwrap().field_type,
        FieldType::Integer
    );
    assert_eq!(
        schema.field("store_and_fwd_flag").unwrap().field_type,
        FieldType::String
    );
}

#[test]
fn test_yellow_trip_schema_type_counts() {
    let schema = yellow_trip_schema();
    let count = |t: FieldType| schema.fields.iter().filter(|f| f.field_type == t).count();
    assert_eq!(count(FieldType::Integer), 6);
    assert_eq!(count(FieldType::Timestamp), 2);
    assert_eq!(count(FieldType::Float), 9);
    assert_eq!(count(FieldType::String), 1);
}

#[test]
fn test_to_arrow() {
    let arrow = yellow_trip_schema().to_arrow();
    assert_eq!(arrow.fields().len(), 18);
    assert_eq!(
        arrow.field_with_name("tpep_dropoff_datetime").unwrap().data_type(),
        &DataType::Timestamp(TimeUnit::Microsecond, None)
    );
    assert_eq!(
        arrow.field_with_name("VendorID").unwrap().data_type(),
        &DataType::Int64
    );
    assert!(arrow.fields().iter().all(|f| f.is_nullable()));
}

#[test]
fn test_bigquery_json_round_trip() {
    let schema = yellow_trip_schema();
    let json = schema.to_bigquery_json();
    assert_eq!(
        json["fields"][0],
        json!({"name": "VendorID", "type": "INTEGER", "mode": "NULLABLE"})
    );

    let parsed = TableSchema::from_bigquery_json(schema.version, &json).unwrap();
    assert_eq!(parsed, schema);
}

#[test]
fn test_from_bigquery_json_accepts_standard_names() {
    let json = json!({"fields": [
        {"name": "a", "type": "INT64"},
        {"name": "b", "type": "FLOAT64"},
    ]});
    let parsed = TableSchema::from_bigquery_json(1, &json).unwrap();
    assert_eq!(parsed.fields[0].field_type, FieldType::Integer);
    assert_eq!(parsed.fields[1].field_type, FieldType::Float);

    assert!(TableSchema::from_bigquery_json(1, &json!({})).is_err());
    assert!(TableSchema::from_bigquery_json(1, &json!({"fields": [{"name": "x", "type": "GEOGRAPHY"}]})).is_err());
}

#[test]
fn test_from_duckdb() {
    assert_eq!(FieldType::from_duckdb("BIGINT").unwrap(), FieldType::Integer);
    assert_eq!(FieldType::from_duckdb("DOUBLE").unwrap(), FieldType::Float);
    assert_eq!(FieldType::from_duckdb("VARCHAR").unwrap(), FieldType::String);
    assert_eq!(
        FieldType::from_duckdb("TIMESTAMP").unwrap(),
        FieldType::Timestamp
    );
    assert!(FieldType::from_duckdb("BLOB").is_err());
}

#[test]
fn test_same_columns_ignores_version() {
    let a = yellow_trip_schema();
    let mut b = yellow_trip_schema();
    b.version += 1;
    assert!(a.same_columns(&b));
    b.fields.pop();
    assert!(!a.same_columns(&b));
}
