//! Yellow taxi trip layout

use super::types::{FieldType, TableSchema};

/// Bump when the column list below changes
pub const YELLOW_TRIP_SCHEMA_VERSION: u32 = 1;

/// Column the cleaner filters on
pub const FARE_COLUMN: &str = "fare_amount";

/// Timestamp column whose date partitions the optimized table
pub const PARTITION_COLUMN: &str = "tpep_pickup_datetime";

/// Column the optimized table is clustered by
pub const CLUSTER_COLUMN: &str = "PULocationID";

const YELLOW_TRIP_FIELDS: [(&str, FieldType); 18] = [
    ("VendorID", FieldType::Integer),
    ("tpep_pickup_datetime", FieldType::Timestamp),
    ("tpep_dropoff_datetime", FieldType::Timestamp),
    ("passenger_count", FieldType::Integer),
    ("trip_distance", FieldType::Float),
    ("RatecodeID", FieldType::Integer),
    ("store_and_fwd_flag", FieldType::String),
    ("PULocationID", FieldType::Integer),
    ("DOLocationID", FieldType::Integer),
    ("payment_type", FieldType::Integer),
    ("fare_amount", FieldType::Float),
    ("extra", FieldType::Float),
    ("mta_tax", FieldType::Float),
    ("tip_amount", FieldType::Float),
    ("tolls_amount", FieldType::Float),
    ("improvement_surcharge", FieldType::Float),
    ("total_amount", FieldType::Float),
    ("congestion_surcharge", FieldType::Float),
];

/// The 18-column yellow trip schema declared to the warehouse
pub fn yellow_trip_schema() -> TableSchema {
    TableSchema::from_pairs(YELLOW_TRIP_SCHEMA_VERSION, &YELLOW_TRIP_FIELDS)
}
