//! Warehouse request and response types

use crate::config::TableRef;
use crate::schema::{TableSchema, CLUSTER_COLUMN, PARTITION_COLUMN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// File format of external table sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceFormat {
    #[default]
    Parquet,
}

impl SourceFormat {
    /// Name used by the BigQuery `sourceFormat` field
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Parquet => "PARQUET",
        }
    }
}

/// An external table over staged objects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalTableDefinition {
    pub table: TableRef,
    pub schema: TableSchema,
    pub source_uris: Vec<String>,
    pub format: SourceFormat,
}

impl ExternalTableDefinition {
    /// Parquet-backed external table
    pub fn parquet(table: TableRef, schema: TableSchema, source_uris: Vec<String>) -> Self {
        Self {
            table,
            schema,
            source_uris,
            format: SourceFormat::Parquet,
        }
    }
}

/// A `CREATE OR REPLACE TABLE ... AS SELECT * FROM source` request
///
/// Only identifiers that passed config validation are interpolated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Materialization {
    pub target: TableRef,
    pub source: TableRef,
    /// Timestamp column partitioned by its date
    pub partition_column: String,
    pub cluster_column: String,
}

impl Materialization {
    /// Materialization of the trip table: daily pickup partitions, clustered by pickup zone
    pub fn trips(target: TableRef, source: TableRef) -> Self {
        Self {
            target,
            source,
            partition_column: PARTITION_COLUMN.to_string(),
            cluster_column: CLUSTER_COLUMN.to_string(),
        }
    }

    /// GoogleSQL statement
    pub fn to_bigquery_sql(&self) -> String {
        format!(
            "CREATE OR REPLACE TABLE {target}\nPARTITION BY DATE({partition})\nCLUSTER BY {cluster}\nAS SELECT * FROM {source}",
            target = self.target.bigquery_ident(),
            partition = self.partition_column,
            cluster = self.cluster_column,
            source = self.source.bigquery_ident(),
        )
    }

    /// DuckDB statement; the layout is approximated by physical sort order
    pub fn to_duckdb_sql(&self) -> String {
        format!(
            "CREATE OR REPLACE TABLE {target} AS SELECT * FROM {source} ORDER BY CAST(\"{partition}\" AS DATE), \"{cluster}\"",
            target = self.target.duckdb_ident(),
            source = self.source.duckdb_ident(),
            partition = self.partition_column,
            cluster = self.cluster_column,
        )
    }
}

/// What a catalog entry is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    External,
    Native,
    View,
}

impl TableKind {
    /// Map a BigQuery table `type` field
    pub fn from_bigquery(kind: &str) -> Self {
        match kind {
            "EXTERNAL" => TableKind::External,
            "VIEW" | "MATERIALIZED_VIEW" => TableKind::View,
            _ => TableKind::Native,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::External => "EXTERNAL",
            TableKind::Native => "NATIVE",
            TableKind::View => "VIEW",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time partitioning of a native table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partitioning {
    pub column: String,
    /// `DAY`, `HOUR`, `MONTH` or `YEAR`
    pub granularity: String,
}

impl Partitioning {
    pub fn daily(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            granularity: "DAY".to_string(),
        }
    }
}

/// Catalog metadata of one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub table: TableRef,
    pub kind: TableKind,
    pub schema: TableSchema,
    pub source_uris: Vec<String>,
    /// Unknown for external tables
    pub num_rows: Option<u64>,
    pub partitioning: Option<Partitioning>,
    pub clustering: Vec<String>,
}

/// Outcome of a completed transformation job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub rows: Option<u64>,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
