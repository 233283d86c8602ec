//! BigQuery REST v2 backend

use super::types::{
    ExternalTableDefinition, JobSummary, Materialization, Partitioning, TableInfo, TableKind,
};
use super::Warehouse;
use crate::auth::AuthConfig;
use crate::config::{PipelineConfig, TableRef};
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use crate::schema::{TableSchema, YELLOW_TRIP_SCHEMA_VERSION};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// BigQuery warehouse over the REST API
#[derive(Debug)]
pub struct BigQueryWarehouse {
    client: HttpClient,
    project: String,
    location: Option<String>,
    poll_interval: Duration,
    job_timeout: Duration,
}

impl BigQueryWarehouse {
    /// Build from pipeline configuration
    pub fn new(config: &PipelineConfig, auth: AuthConfig) -> Result<Self> {
        let http_config = HttpClientConfig::builder()
            .base_url(&config.warehouse.api_url)
            .timeout(Duration::from_secs(60))
            .max_retries(2)
            .build();
        let client = HttpClient::with_auth(http_config, auth)?;

        Ok(Self::with_client(
            client,
            &config.project_id,
            config.warehouse.location.clone(),
            config.warehouse.poll_interval(),
            config.warehouse.job_timeout(),
        ))
    }

    /// Build around an existing HTTP client
    pub fn with_client(
        client: HttpClient,
        project: impl Into<String>,
        location: Option<String>,
        poll_interval: Duration,
        job_timeout: Duration,
    ) -> Self {
        Self {
            client,
            project: project.into(),
            location,
            poll_interval,
            job_timeout,
        }
    }

    fn tables_path(table: &TableRef) -> String {
        format!(
            "/projects/{}/datasets/{}/tables",
            table.project, table.dataset
        )
    }

    fn table_path(table: &TableRef) -> String {
        format!("{}/{}", Self::tables_path(table), table.table)
    }

    /// Table resource for `tables.insert` / `tables.update`
    pub fn external_table_resource(definition: &ExternalTableDefinition) -> Value {
        json!({
            "tableReference": {
                "projectId": definition.table.project,
                "datasetId": definition.table.dataset,
                "tableId": definition.table.table,
            },
            "schema": definition.schema.to_bigquery_json(),
            "externalDataConfiguration": {
                "sourceFormat": definition.format.as_str(),
                "sourceUris": definition.source_uris,
                "autodetect": false,
            },
        })
    }

    async fn get_table(&self, table: &TableRef) -> Result<Option<Value>> {
        match self.client.get_json::<Value>(&Self::table_path(table)).await {
            Ok(resource) => Ok(Some(resource)),
            Err(Error::HttpStatus { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Submit a query job, returning its id and the initial job resource
    async fn insert_job(&self, sql: &str) -> Result<(String, Value)> {
        let job_id = format!("nyc_taxi_{}", Utc::now().format("%Y%m%d%H%M%S%3f"));
        let mut job_reference = json!({
            "projectId": self.project,
            "jobId": job_id,
        });
        if let Some(location) = &self.location {
            job_reference["location"] = json!(location);
        }

        let body = json!({
            "jobReference": job_reference,
            "configuration": {
                "query": {
                    "query": sql,
                    "useLegacySql": false,
                },
            },
        });

        debug!("Submitting BigQuery job {}: {}", job_id, sql);
        let path = format!("/projects/{}/jobs", self.project);
        let resource = match self
            .client
            .request_json(Method::POST, &path, RequestConfig::new().json(body))
            .await
        {
            Ok(resource) => resource,
            // A retried insert whose first attempt created the job
            Err(Error::HttpStatus { status: 409, .. }) => {
                debug!("Job {} already exists, resuming from jobs.get", job_id);
                self.get_job(&job_id).await?
            }
            Err(e) => return Err(Error::query(format!("jobs.insert failed: {e}"))),
        };

        Ok((job_id, resource))
    }

    async fn get_job(&self, job_id: &str) -> Result<Value> {
        let path = format!("/projects/{}/jobs/{job_id}", self.project);
        let mut request = RequestConfig::new();
        if let Some(location) = &self.location {
            request = request.query("location", location);
        }
        self.client
            .request_json(Method::GET, &path, request)
            .await
            .map_err(|e| Error::query(format!("jobs.get failed for {job_id}: {e}")))
    }

    /// Poll `jobs.get` until the job reports `DONE`
    async fn wait_for_job(&self, job_id: &str, mut resource: Value) -> Result<Value> {
        let started = Instant::now();

        loop {
            let state = resource
                .pointer("/status/state")
                .and_then(Value::as_str)
                .unwrap_or("PENDING");

            if state == "DONE" {
                if let Some(error) = resource.pointer("/status/errorResult") {
                    let message = error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    return Err(Error::query(format!("job {job_id}: {message}")));
                }
                return Ok(resource);
            }

            if started.elapsed() >= self.job_timeout {
                return Err(Error::query(format!(
                    "job {job_id} did not complete within {:?}",
                    self.job_timeout
                )));
            }

            debug!("Job {} is {}, polling again in {:?}", job_id, state, self.poll_interval);
            tokio::time::sleep(self.poll_interval).await;

            resource = self.get_job(job_id).await?;
        }
    }
}

/// Parse a table resource returned by `tables.get`
pub(super) fn parse_table_info(table: &TableRef, resource: &Value) -> Result<TableInfo> {
    let kind = TableKind::from_bigquery(
        resource
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("TABLE"),
    );

    let schema = match resource.get("schema") {
        Some(schema) => TableSchema::from_bigquery_json(YELLOW_TRIP_SCHEMA_VERSION, schema)?,
        None => TableSchema::from_pairs(YELLOW_TRIP_SCHEMA_VERSION, &[]),
    };

    let source_uris = resource
        .pointer("/externalDataConfiguration/sourceUris")
        .and_then(Value::as_array)
        .map(|uris| {
            uris.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    // int64 values are encoded as JSON strings
    let num_rows = match kind {
        TableKind::External => None,
        _ => resource
            .get("numRows")
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_u64())),
    };

    let partitioning = resource.get("timePartitioning").map(|p| Partitioning {
        column: p
            .get("field")
            .and_then(Value::as_str)
            .unwrap_or("_PARTITIONTIME")
            .to_string(),
        granularity: p
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("DAY")
            .to_string(),
    });

    let clustering = resource
        .pointer("/clustering/fields")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(TableInfo {
        table: table.clone(),
        kind,
        schema,
        source_uris,
        num_rows,
        partitioning,
        clustering,
    })
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    async fn create_external_table(&self, definition: &ExternalTableDefinition) -> Result<()> {
        let table = &definition.table;
        let resource = Self::external_table_resource(definition);
        let catalog_err = |e: Error| Error::catalog(table.to_string(), e.to_string());

        match self
            .client
            .post(&Self::tables_path(table), resource.clone())
            .await
        {
            Ok(_) => {
                info!(table = %table, uris = definition.source_uris.len(), "Created external table");
                return Ok(());
            }
            Err(Error::HttpStatus { status: 409, .. }) => {
                debug!("Table {} already exists, checking its type", table);
            }
            Err(e @ Error::HttpStatus { .. }) => return Err(catalog_err(e)),
            Err(e) => return Err(e),
        }

        let existing = self.get_table(table).await?.ok_or_else(|| {
            Error::catalog(table.to_string(), "reported as existing but not found")
        })?;
        let kind = TableKind::from_bigquery(
            existing.get("type").and_then(Value::as_str).unwrap_or("TABLE"),
        );
        if kind != TableKind::External {
            return Err(Error::catalog(
                table.to_string(),
                format!("name is bound to a {kind} table, not an external table"),
            ));
        }

        self.client
            .request(
                Method::PUT,
                &Self::table_path(table),
                RequestConfig::new().json(resource),
            )
            .await
            .map_err(|e| match e {
                e @ Error::HttpStatus { .. } => catalog_err(e),
                e => e,
            })?;

        info!(table = %table, uris = definition.source_uris.len(), "Replaced external table");
        Ok(())
    }

    async fn replace_table_as_select(
        &self,
        materialization: &Materialization,
    ) -> Result<JobSummary> {
        let started = Instant::now();
        let sql = materialization.to_bigquery_sql();

        let (job_id, resource) = self.insert_job(&sql).await?;
        let done = self.wait_for_job(&job_id, resource).await?;

        let rows = done
            .pointer("/statistics/query/numDmlAffectedRows")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());

        Ok(JobSummary {
            job_id,
            rows,
            elapsed: started.elapsed(),
        })
    }

    async fn table_info(&self, table: &TableRef) -> Result<Option<TableInfo>> {
        match self.get_table(table).await? {
            Some(resource) => parse_table_info(table, &resource).map(Some),
            None => Ok(None),
        }
    }
}
