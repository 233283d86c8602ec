//! Schema types

use crate::error::{Error, Result};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Warehouse column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    /// 64-bit signed integer
    Integer,
    /// 64-bit floating point
    Float,
    /// UTF-8 text
    String,
    /// Timestamp with microsecond precision
    Timestamp,
}

impl FieldType {
    /// BigQuery legacy type name, as used in table resources
    pub fn bigquery_name(&self) -> &'static str {
        match self {
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::String => "STRING",
            FieldType::Timestamp => "TIMESTAMP",
        }
    }

    /// DuckDB column type
    pub fn duckdb_name(&self) -> &'static str {
        match self {
            FieldType::Integer => "BIGINT",
            FieldType::Float => "DOUBLE",
            FieldType::String => "VARCHAR",
            FieldType::Timestamp => "TIMESTAMP",
        }
    }

    /// Arrow data type used when writing Parquet
    pub fn arrow_type(&self) -> DataType {
        match self {
            FieldType::Integer => DataType::Int64,
            FieldType::Float => DataType::Float64,
            FieldType::String => DataType::Utf8,
            FieldType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }

    /// Parse a BigQuery type name (legacy or standard SQL spelling)
    pub fn from_bigquery(name: &str) -> Result<Self> {
        match name.to_uppercase().as_str() {
            "INTEGER" | "INT64" => Ok(FieldType::Integer),
            "FLOAT" | "FLOAT64" => Ok(FieldType::Float),
            "STRING" => Ok(FieldType::String),
            "TIMESTAMP" => Ok(FieldType::Timestamp),
            other => Err(Error::config(format!("Unsupported BigQuery type: {other}"))),
        }
    }

    /// Parse a DuckDB type name as reported by `information_schema.columns`
    pub fn from_duckdb(name: &str) -> Result<Self> {
        let upper = name.to_uppercase();
        match upper.as_str() {
            "BIGINT" | "INTEGER" | "SMALLINT" | "TINYINT" | "HUGEINT" => Ok(FieldType::Integer),
            "DOUBLE" | "FLOAT" | "REAL" => Ok(FieldType::Float),
            "VARCHAR" | "TEXT" => Ok(FieldType::String),
            t if t.starts_with("TIMESTAMP") => Ok(FieldType::Timestamp),
            other => Err(Error::config(format!("Unsupported DuckDB type: {other}"))),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bigquery_name())
    }
}

/// A single named column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Column name
    pub name: String,
    /// Column type
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl SchemaField {
    /// Create a new field
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Ordered column list with a version tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Descriptor version, bumped on any column change
    pub version: u32,
    /// Columns in declaration order
    pub fields: Vec<SchemaField>,
}

impl TableSchema {
    /// Build a schema from (name, type) pairs
    pub fn from_pairs(version: u32, pairs: &[(&str, FieldType)]) -> Self {
        Self {
            version,
            fields: pairs
                .iter()
                .map(|(name, field_type)| SchemaField::new(*name, *field_type))
                .collect(),
        }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a column by name
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Column names in order
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Same columns and types, ignoring the version tag
    pub fn same_columns(&self, other: &TableSchema) -> bool {
        self.fields == other.fields
    }

    /// Nullable Arrow schema
    pub fn to_arrow(&self) -> Schema {
        Schema::new(
            self.fields
                .iter()
                .map(|f| Field::new(&f.name, f.field_type.arrow_type(), true))
                .collect::<Vec<_>>(),
        )
    }

    /// BigQuery `TableSchema` resource (`{"fields": [...]}`)
    pub fn to_bigquery_json(&self) -> Value {
        let fields: Vec<Value> = self
            .fields
            .iter()
            .map(|f| {
                json!({
                    "name": f.name,
                    "type": f.field_type.bigquery_name(),
                    "mode": "NULLABLE",
                })
            })
            .collect();
        json!({ "fields": fields })
    }

    /// Parse the `fields` array of a BigQuery table resource
    pub fn from_bigquery_json(version: u32, value: &Value) -> Result<Self> {
        let fields = value
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::config("Table schema has no 'fields' array"))?;

        let fields = fields
            .iter()
            .map(|f| {
                let name = f
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::config("Schema field without name"))?;
                let field_type = f
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::config(format!("Schema field '{name}' without type")))?;
                Ok(SchemaField::new(name, FieldType::from_bigquery(field_type)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { version, fields })
    }
}
