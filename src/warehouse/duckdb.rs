//! DuckDB local warehouse
//!
//! Datasets map to DuckDB schemas. An external table is a view over
//! `read_parquet([...])` with every column cast to its declared type. Layout
//! metadata that DuckDB has no native notion of (external source URIs,
//! partitioning and clustering) lives in `pipeline_table_metadata`.

use super::types::{
    ExternalTableDefinition, JobSummary, Materialization, Partitioning, TableInfo, TableKind,
};
use super::Warehouse;
use crate::config::TableRef;
use crate::error::{Error, Result};
use crate::schema::{FieldType, SchemaField, TableSchema, YELLOW_TRIP_SCHEMA_VERSION};
use async_trait::async_trait;
use chrono::Utc;
use duckdb::{params, Connection, OptionalExt};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

const METADATA_TABLE: &str = "pipeline_table_metadata";

/// DuckDB-backed warehouse
pub struct DuckDbWarehouse {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl std::fmt::Debug for DuckDbWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbWarehouse")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Quote a string literal for SQL
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn is_remote(uri: &str) -> bool {
    ["gs://", "gcs://", "s3://", "r2://", "az://", "http://", "https://"]
        .iter()
        .any(|scheme| uri.starts_with(scheme))
}

impl DuckDbWarehouse {
    /// Open (or create) the database file; `:memory:` opens an in-process database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path)
        }
        .map_err(|e| Error::config(format!("Failed to open DuckDB at {}: {e}", path.display())))?;

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS main.{METADATA_TABLE} (
                table_name VARCHAR PRIMARY KEY,
                kind VARCHAR NOT NULL,
                source_uris VARCHAR,
                partition_by VARCHAR,
                cluster_by VARCHAR,
                schema_version INTEGER,
                updated_at VARCHAR
            );"
        ))
        .map_err(|e| Error::config(format!("Failed to create metadata table: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    /// In-process database, discarded on drop
    pub fn in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Run `f` against the connection on a blocking worker thread
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::Other("DuckDB connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::Other(format!("DuckDB worker failed: {e}")))?
    }
}

/// Load httpfs and pass through object store credentials from the environment
fn configure_cloud_storage(conn: &Connection) -> Result<()> {
    conn.execute_batch("INSTALL httpfs; LOAD httpfs;")
        .map_err(|e| Error::config(format!("Failed to load httpfs extension: {e}")))?;

    if let (Ok(key_id), Ok(secret)) = (
        std::env::var("AWS_ACCESS_KEY_ID"),
        std::env::var("AWS_SECRET_ACCESS_KEY"),
    ) {
        let region =
            std::env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        conn.execute_batch(&format!(
            "SET s3_access_key_id = {}; SET s3_secret_access_key = {}; SET s3_region = {};",
            quote_literal(&key_id),
            quote_literal(&secret),
            quote_literal(&region)
        ))
        .map_err(|e| Error::config(format!("Failed to configure S3: {e}")))?;
    }

    // GCS through its S3-compatible HMAC interoperability keys
    if let (Ok(key_id), Ok(secret)) = (
        std::env::var("GCS_HMAC_KEY_ID"),
        std::env::var("GCS_HMAC_SECRET"),
    ) {
        conn.execute_batch(&format!(
            "CREATE OR REPLACE SECRET gcs_staging (TYPE GCS, KEY_ID {}, SECRET {});",
            quote_literal(&key_id),
            quote_literal(&secret)
        ))
        .map_err(|e| Error::config(format!("Failed to configure GCS: {e}")))?;
    }

    Ok(())
}

/// `information_schema.tables.table_type` for a table, if it exists
fn table_type(conn: &Connection, table: &TableRef) -> Result<Option<String>> {
    conn.query_row(
        "SELECT table_type FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
        params![table.dataset, table.table],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .map_err(|e| Error::Other(format!("Failed to look up {table}: {e}")))
}

fn metadata_key(table: &TableRef) -> String {
    format!("{}.{}", table.dataset, table.table)
}

struct MetadataRow {
    kind: String,
    source_uris: Option<String>,
    partition_by: Option<String>,
    cluster_by: Option<String>,
}

fn read_metadata(conn: &Connection, table: &TableRef) -> Result<Option<MetadataRow>> {
    conn.query_row(
        &format!(
            "SELECT kind, source_uris, partition_by, cluster_by FROM main.{METADATA_TABLE} WHERE table_name = ?"
        ),
        params![metadata_key(table)],
        |row| {
            Ok(MetadataRow {
                kind: row.get(0)?,
                source_uris: row.get(1)?,
                partition_by: row.get(2)?,
                cluster_by: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(|e| Error::Other(format!("Failed to read metadata for {table}: {e}")))
}

fn write_metadata(
    conn: &Connection,
    table: &TableRef,
    kind: TableKind,
    source_uris: Option<&[String]>,
    partitioning: Option<&Partitioning>,
    clustering: &[String],
) -> Result<()> {
    let source_uris = source_uris.map(serde_json::to_string).transpose()?;
    let partition_by = partitioning.map(serde_json::to_string).transpose()?;
    let cluster_by = serde_json::to_string(clustering)?;

    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO main.{METADATA_TABLE}
             (table_name, kind, source_uris, partition_by, cluster_by, schema_version, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        ),
        params![
            metadata_key(table),
            kind.as_str(),
            source_uris,
            partition_by,
            cluster_by,
            YELLOW_TRIP_SCHEMA_VERSION,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| Error::Other(format!("Failed to write metadata for {table}: {e}")))?;
    Ok(())
}

/// `CREATE OR REPLACE VIEW` statement for an external table
pub(super) fn external_view_sql(definition: &ExternalTableDefinition) -> String {
    let columns: Vec<String> = definition
        .schema
        .fields
        .iter()
        .map(|f| {
            format!(
                "CAST(\"{name}\" AS {ty}) AS \"{name}\"",
                name = f.name,
                ty = f.field_type.duckdb_name()
            )
        })
        .collect();
    let uris: Vec<String> = definition
        .source_uris
        .iter()
        .map(|u| quote_literal(u))
        .collect();

    format!(
        "CREATE OR REPLACE VIEW {} AS SELECT {} FROM read_parquet([{}])",
        definition.table.duckdb_ident(),
        columns.join(", "),
        uris.join(", ")
    )
}

fn create_external(conn: &Connection, definition: &ExternalTableDefinition) -> Result<()> {
    let table = &definition.table;
    let catalog_err = |message: String| Error::catalog(table.to_string(), message);

    if definition.source_uris.is_empty() {
        return Err(catalog_err("no source URIs".to_string()));
    }

    conn.execute_batch(&format!("CREATE SCHEMA IF NOT EXISTS \"{}\";", table.dataset))
        .map_err(|e| catalog_err(format!("failed to create dataset: {e}")))?;

    let existing = match table_type(conn, table)?.as_deref() {
        None => None,
        Some("VIEW") => match read_metadata(conn, table)? {
            Some(m) if m.kind == TableKind::External.as_str() => None,
            _ => Some(TableKind::View),
        },
        Some(_) => Some(TableKind::Native),
    };
    if let Some(kind) = existing {
        return Err(catalog_err(format!(
            "name is bound to a {kind} table, not an external table"
        )));
    }

    if definition.source_uris.iter().any(|u| is_remote(u)) {
        configure_cloud_storage(conn)?;
    }

    let sql = external_view_sql(definition);
    debug!("DuckDB: {}", sql);
    conn.execute_batch(&sql)
        .map_err(|e| catalog_err(format!("definition rejected: {e}")))?;

    write_metadata(
        conn,
        table,
        TableKind::External,
        Some(&definition.source_uris),
        None,
        &[],
    )
}

fn materialize(conn: &Connection, materialization: &Materialization) -> Result<u64> {
    let target = &materialization.target;
    let source = &materialization.source;

    if table_type(conn, source)?.is_none() {
        return Err(Error::query(format!("source table {source} does not exist")));
    }
    if table_type(conn, target)?.as_deref() == Some("VIEW") {
        return Err(Error::query(format!("{target} exists and is a view")));
    }

    let sql = materialization.to_duckdb_sql();
    debug!("DuckDB: {}", sql);
    conn.execute_batch(&sql)
        .map_err(|e| Error::query(format!("{target}: {e}")))?;

    write_metadata(
        conn,
        target,
        TableKind::Native,
        None,
        Some(&Partitioning::daily(&materialization.partition_column)),
        std::slice::from_ref(&materialization.cluster_column),
    )?;

    count_rows(conn, target).map_err(|e| Error::query(e.to_string()))
}

fn count_rows(conn: &Connection, table: &TableRef) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM {}", table.duckdb_ident()),
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::Other(format!("Failed to count rows of {table}: {e}")))?;
    Ok(count.max(0) as u64)
}

fn read_columns(conn: &Connection, table: &TableRef) -> Result<TableSchema> {
    let mut stmt = conn
        .prepare(
            "SELECT column_name, data_type FROM information_schema.columns
             WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
        )
        .map_err(|e| Error::Other(format!("Failed to prepare column query: {e}")))?;

    let rows: Vec<(String, String)> = stmt
        .query_map(params![table.dataset, table.table], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(|e| Error::Other(format!("Failed to read columns of {table}: {e}")))?
        .filter_map(std::result::Result::ok)
        .collect();

    let fields = rows
        .into_iter()
        .map(|(name, ty)| Ok(SchemaField::new(name, FieldType::from_duckdb(&ty)?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(TableSchema {
        version: YELLOW_TRIP_SCHEMA_VERSION,
        fields,
    })
}

fn describe(conn: &Connection, table: &TableRef) -> Result<Option<TableInfo>> {
    let Some(table_type) = table_type(conn, table)? else {
        return Ok(None);
    };
    let metadata = read_metadata(conn, table)?;

    let kind = match (table_type.as_str(), metadata.as_ref().map(|m| m.kind.as_str())) {
        ("VIEW", Some("EXTERNAL")) => TableKind::External,
        ("VIEW", _) => TableKind::View,
        _ => TableKind::Native,
    };

    let schema = read_columns(conn, table)?;
    let num_rows = match kind {
        TableKind::Native => Some(count_rows(conn, table)?),
        _ => None,
    };

    let (source_uris, partitioning, clustering): (Vec<String>, Option<Partitioning>, Vec<String>) =
        match metadata {
            Some(m) => (
                m.source_uris
                    .map(|s| serde_json::from_str(&s))
                    .transpose()?
                    .unwrap_or_default(),
                m.partition_by
                    .map(|s| serde_json::from_str(&s))
                    .transpose()?,
                m.cluster_by
                    .map(|s| serde_json::from_str(&s))
                    .transpose()?
                    .unwrap_or_default(),
            ),
            None => (Vec::new(), None, Vec::new()),
        };

    Ok(Some(TableInfo {
        table: table.clone(),
        kind,
        schema,
        source_uris,
        num_rows,
        partitioning,
        clustering,
    }))
}

#[async_trait]
impl Warehouse for DuckDbWarehouse {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    async fn create_external_table(&self, definition: &ExternalTableDefinition) -> Result<()> {
        let definition = definition.clone();
        let table = definition.table.clone();
        let uris = definition.source_uris.len();
        self.with_conn(move |conn| create_external(conn, &definition))
            .await?;
        info!(table = %table, uris, "Registered external table");
        Ok(())
    }

    async fn replace_table_as_select(
        &self,
        materialization: &Materialization,
    ) -> Result<JobSummary> {
        let started = Instant::now();
        let job = materialization.clone();
        let rows = self.with_conn(move |conn| materialize(conn, &job)).await?;

        Ok(JobSummary {
            job_id: format!("duckdb_{}", Utc::now().format("%Y%m%d%H%M%S%3f")),
            rows: Some(rows),
            elapsed: started.elapsed(),
        })
    }

    async fn table_info(&self, table: &TableRef) -> Result<Option<TableInfo>> {
        let table = table.clone();
        self.with_conn(move |conn| describe(conn, &table)).await
    }
}
