//! Pipeline configuration
//!
//! One `PipelineConfig` is built at process start (defaults, then an optional
//! YAML file, then environment variables) and passed by reference into every
//! stage. All derived names (URLs, filenames, object keys, table references)
//! are computed here so each stage sees the same values.

use crate::error::{Error, Result};
use crate::types::{parse_period_list, OptionStringExt, Period, WarehouseBackend};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Regex for warehouse identifiers that are safe to interpolate into SQL
static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Regex for GCP project ids (lowercase, digits, hyphens)
static PROJECT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9\-]{4,28}[a-z0-9]$").unwrap());

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cloud project identifier
    pub project_id: String,

    /// Object store bucket (derived from the project when unset)
    pub bucket: Option<String>,

    /// Warehouse dataset holding both tables
    pub dataset: String,

    /// Local directory for raw and cleaned files
    pub scratch_dir: PathBuf,

    /// Months to process, in order
    pub periods: Vec<Period>,

    /// Source endpoint settings
    pub source: SourceConfig,

    /// Object store settings
    pub staging: StagingConfig,

    /// Warehouse settings
    pub warehouse: WarehouseConfig,

    /// Stage retry policy
    pub retry: RetryConfig,

    /// Scheduler settings
    pub schedule: ScheduleConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_id: "nyc-taxi-project-12345".to_string(),
            bucket: None,
            dataset: "nyc_taxi_data".to_string(),
            scratch_dir: PathBuf::from("/tmp/nyc_taxi_data"),
            periods: (1..=3).filter_map(|m| Period::new(2023, m).ok()).collect(),
            source: SourceConfig::default(),
            staging: StagingConfig::default(),
            warehouse: WarehouseConfig::default(),
            retry: RetryConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Source endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL; files live at `<base_url>/<dataset_name>_<period>.parquet`
    pub base_url: String,
    /// Dataset name used in file names (e.g. `yellow_tripdata`)
    pub dataset_name: String,
    /// Timeout for one file download
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://d37ci6vzurychx.cloudfront.net/trip-data".to_string(),
            dataset_name: "yellow_tripdata".to_string(),
            timeout_secs: 600,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Object store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Destination URL (`gs://bucket`, `s3://bucket`, or a local directory).
    /// Defaults to `gs://<bucket>`.
    pub url: Option<String>,
    /// Key prefix for staged objects
    pub prefix: String,
    /// Glob matched against the scratch directory
    pub pattern: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            url: None,
            prefix: "yellow_tripdata".to_string(),
            pattern: "processed_*.parquet".to_string(),
        }
    }
}

/// Warehouse configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Backend implementation
    pub backend: WarehouseBackend,
    /// External table name
    pub external_table: String,
    /// Optimized native table name
    pub optimized_table: String,
    /// BigQuery job location (e.g. `US`)
    pub location: Option<String>,
    /// BigQuery REST base URL
    pub api_url: String,
    /// DuckDB database file (`:memory:` for in-process)
    pub duckdb_path: PathBuf,
    /// Delay between job status polls
    pub poll_interval_ms: u64,
    /// Give up waiting for a job after this long
    pub job_timeout_secs: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            backend: WarehouseBackend::BigQuery,
            external_table: "external_yellow_tripdata".to_string(),
            optimized_table: "yellow_tripdata".to_string(),
            location: None,
            api_url: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
            duckdb_path: PathBuf::from("/tmp/nyc_taxi_data/warehouse.duckdb"),
            poll_interval_ms: 1000,
            job_timeout_secs: 1800,
        }
    }
}

impl WarehouseConfig {
    /// Delay between job status polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Maximum time to wait for a job
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// Stage retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra attempts per stage after the first failure
    pub retries: u32,
    /// Fixed delay before a retry
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 1,
            delay_secs: 300,
        }
    }
}

impl RetryConfig {
    /// Retry delay as a duration
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between scheduled runs
    pub interval_secs: u64,
    /// Replay intervals missed while the scheduler was down
    pub catchup: bool,
    /// Send alerts on final failure
    pub email_on_failure: bool,
    /// Send alerts on retry
    pub email_on_retry: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 86_400,
            catchup: false,
            email_on_failure: false,
            email_on_retry: false,
        }
    }
}

impl ScheduleConfig {
    /// Interval between runs
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ============================================================================
// Table Reference
// ============================================================================

/// Fully qualified warehouse table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Project id
    pub project: String,
    /// Dataset id
    pub dataset: String,
    /// Table id
    pub table: String,
}

impl TableRef {
    /// Create a table reference
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// Backtick-quoted identifier for GoogleSQL
    pub fn bigquery_ident(&self) -> String {
        format!("`{}.{}.{}`", self.project, self.dataset, self.table)
    }

    /// Double-quoted `schema.table` identifier for DuckDB
    pub fn duckdb_ident(&self) -> String {
        format!("\"{}\".\"{}\"", self.dataset, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

// ============================================================================
// Loading
// ============================================================================

impl PipelineConfig {
    /// Load configuration: defaults, then the YAML file (if any), then the
    /// process environment. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).none_if_empty();

        if let Some(v) = get("GCP_PROJECT_ID") {
            self.project_id = v;
        }
        if let Some(v) = get("NYC_TAXI_BUCKET") {
            self.bucket = Some(v);
        }
        if let Some(v) = get("NYC_TAXI_DATASET") {
            self.dataset = v;
        }
        if let Some(v) = get("NYC_TAXI_SCRATCH_DIR") {
            self.scratch_dir = PathBuf::from(v);
        }
        if let Some(v) = get("NYC_TAXI_PERIODS") {
            self.periods = parse_period_list(&v)?;
        }
        if let Some(v) = get("NYC_TAXI_SOURCE_URL") {
            self.source.base_url = v;
        }
        if let Some(v) = get("NYC_TAXI_STAGING_URL") {
            self.staging.url = Some(v);
        }
        if let Some(v) = get("NYC_TAXI_WAREHOUSE") {
            self.warehouse.backend = v.parse()?;
        }
        if let Some(v) = get("NYC_TAXI_DUCKDB_PATH") {
            self.warehouse.duckdb_path = PathBuf::from(v);
        }
        if let Some(v) = get("BIGQUERY_API_URL") {
            self.warehouse.api_url = v;
        }
        if let Some(v) = get("BIGQUERY_LOCATION") {
            self.warehouse.location = Some(v);
        }
        if let Some(v) = get("NYC_TAXI_RETRIES") {
            self.retry.retries = v
                .parse()
                .map_err(|_| Error::invalid_value("NYC_TAXI_RETRIES", v.clone()))?;
        }
        if let Some(v) = get("NYC_TAXI_RETRY_DELAY_SECS") {
            self.retry.delay_secs = v
                .parse()
                .map_err(|_| Error::invalid_value("NYC_TAXI_RETRY_DELAY_SECS", v.clone()))?;
        }
        Ok(())
    }

    /// Check invariants that every stage relies on
    pub fn validate(&self) -> Result<()> {
        if !PROJECT_REGEX.is_match(&self.project_id) {
            return Err(Error::invalid_value(
                "project_id",
                format!("'{}' is not a valid project id", self.project_id),
            ));
        }

        for (field, value) in [
            ("dataset", &self.dataset),
            ("warehouse.external_table", &self.warehouse.external_table),
            ("warehouse.optimized_table", &self.warehouse.optimized_table),
        ] {
            if !IDENTIFIER_REGEX.is_match(value) {
                return Err(Error::invalid_value(
                    field,
                    format!("'{value}' must match [A-Za-z_][A-Za-z0-9_]*"),
                ));
            }
        }

        if self.warehouse.external_table == self.warehouse.optimized_table {
            return Err(Error::invalid_value(
                "warehouse.optimized_table",
                "must differ from the external table",
            ));
        }

        if self.periods.is_empty() {
            return Err(Error::invalid_value("periods", "at least one period is required"));
        }

        let mut seen = std::collections::HashSet::new();
        for period in &self.periods {
            if !seen.insert(period) {
                return Err(Error::invalid_value(
                    "periods",
                    format!("duplicate period {period}"),
                ));
            }
        }

        if self.source.dataset_name.is_empty() || self.source.dataset_name.contains('/') {
            return Err(Error::invalid_value(
                "source.dataset_name",
                "must be a non-empty file name component",
            ));
        }

        if self.staging.prefix.trim_matches('/').is_empty() {
            return Err(Error::invalid_value("staging.prefix", "must not be empty"));
        }

        let pattern = glob::Pattern::new(&self.staging.pattern)
            .map_err(|e| Error::invalid_value("staging.pattern", e.to_string()))?;
        if let Some(period) = self
            .periods
            .iter()
            .find(|p| !pattern.matches(&self.processed_filename(p)))
        {
            return Err(Error::invalid_value(
                "staging.pattern",
                format!(
                    "'{}' does not match cleaned file '{}'",
                    self.staging.pattern,
                    self.processed_filename(period)
                ),
            ));
        }

        url::Url::parse(&self.source.base_url)?;
        url::Url::parse(&self.warehouse.api_url)?;

        if self.warehouse.poll_interval_ms == 0 {
            return Err(Error::invalid_value("warehouse.poll_interval_ms", "must be > 0"));
        }

        Ok(())
    }

    // ========================================================================
    // Derived names
    // ========================================================================

    /// Object store bucket
    pub fn bucket(&self) -> String {
        self.bucket
            .clone()
            .unwrap_or_else(|| format!("{}_data_lake", self.project_id))
    }

    /// Source URL for one period
    pub fn source_url(&self, period: &Period) -> String {
        format!(
            "{}/{}",
            self.source.base_url.trim_end_matches('/'),
            self.raw_filename(period)
        )
    }

    /// `<dataset>_<period>.parquet`
    pub fn raw_filename(&self, period: &Period) -> String {
        format!("{}_{period}.parquet", self.source.dataset_name)
    }

    /// `processed_<dataset>_<period>.parquet`
    pub fn processed_filename(&self, period: &Period) -> String {
        format!("processed_{}", self.raw_filename(period))
    }

    /// Raw file path inside a scratch directory
    pub fn raw_path(&self, scratch: &Path, period: &Period) -> PathBuf {
        scratch.join(self.raw_filename(period))
    }

    /// Cleaned file path inside a scratch directory
    pub fn processed_path(&self, scratch: &Path, period: &Period) -> PathBuf {
        scratch.join(self.processed_filename(period))
    }

    /// Glob matching every cleaned file in a scratch directory
    ///
    /// The directory part is escaped; only `staging.pattern` is a pattern.
    pub fn processed_glob(&self, scratch: &Path) -> String {
        let dir = glob::Pattern::escape(&scratch.to_string_lossy());
        Path::new(&dir)
            .join(&self.staging.pattern)
            .to_string_lossy()
            .to_string()
    }

    /// Staging destination URL
    pub fn staging_url(&self) -> String {
        self.staging
            .url
            .clone()
            .unwrap_or_else(|| format!("gs://{}", self.bucket()))
    }

    /// Object key for a cleaned file name
    pub fn staged_key_for(&self, filename: &str) -> String {
        format!("{}/{filename}", self.staging.prefix.trim_matches('/'))
    }

    /// Object key for one period
    pub fn staged_key(&self, period: &Period) -> String {
        self.staged_key_for(&self.processed_filename(period))
    }

    /// Full URI of one period's staged object, as the warehouse reads it
    pub fn staged_uri(&self, period: &Period) -> String {
        let base = self.staging_url();
        let base = base.strip_prefix("file://").unwrap_or(&base);
        format!("{}/{}", base.trim_end_matches('/'), self.staged_key(period))
    }

    /// Staged URIs for every configured period, in period order
    pub fn staged_uris(&self) -> Vec<String> {
        self.periods.iter().map(|p| self.staged_uri(p)).collect()
    }

    /// External table reference
    pub fn external_table(&self) -> TableRef {
        TableRef::new(
            &self.project_id,
            &self.dataset,
            &self.warehouse.external_table,
        )
    }

    /// Optimized table reference
    pub fn optimized_table(&self) -> TableRef {
        TableRef::new(
            &self.project_id,
            &self.dataset,
            &self.warehouse.optimized_table,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn period(s: &str) -> Period {
        s.parse().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.project_id, "nyc-taxi-project-12345");
        assert_eq!(config.bucket(), "nyc-taxi-project-12345_data_lake");
        assert_eq!(config.dataset, "nyc_taxi_data");
        assert_eq!(config.scratch_dir, PathBuf::from("/tmp/nyc_taxi_data"));
        assert_eq!(
            config.periods,
            vec![period("2023-01"), period("2023-02"), period("2023-03")]
        );
        assert_eq!(config.retry.retries, 1);
        assert_eq!(config.retry.delay(), Duration::from_secs(300));
        assert_eq!(config.schedule.interval(), Duration::from_secs(86_400));
        assert!(!config.schedule.catchup);
        assert!(!config.schedule.email_on_failure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_names() {
        let config = PipelineConfig::default();
        let p = period("2023-01");

        assert_eq!(
            config.source_url(&p),
            "https://d37ci6vzurychx.cloudfront.net/trip-data/yellow_tripdata_2023-01.parquet"
        );
        assert_eq!(config.raw_filename(&p), "yellow_tripdata_2023-01.parquet");
        assert_eq!(
            config.processed_filename(&p),
            "processed_yellow_tripdata_2023-01.parquet"
        );
        assert_eq!(
            config.staged_key(&p),
            "yellow_tripdata/processed_yellow_tripdata_2023-01.parquet"
        );
        assert_eq!(
            config.staged_uri(&p),
            "gs://nyc-taxi-project-12345_data_lake/yellow_tripdata/processed_yellow_tripdata_2023-01.parquet"
        );
        assert_eq!(
            config.raw_path(Path::new("/scratch"), &p),
            PathBuf::from("/scratch/yellow_tripdata_2023-01.parquet")
        );
        assert_eq!(
            config.processed_glob(Path::new("/scratch")),
            "/scratch/processed_*.parquet"
        );
    }

    #[test]
    fn test_staged_uris_follow_periods() {
        let config = PipelineConfig::default();
        let uris = config.staged_uris();
        assert_eq!(uris.len(), 3);
        assert!(uris[2].ends_with("processed_yellow_tripdata_2023-03.parquet"));
    }

    #[test]
    fn test_local_staging_uri() {
        let mut config = PipelineConfig::default();
        config.staging.url = Some("file:///data/lake/".to_string());
        assert_eq!(
            config.staged_uri(&period("2023-02")),
            "/data/lake/yellow_tripdata/processed_yellow_tripdata_2023-02.parquet"
        );
    }

    #[test]
    fn test_table_refs() {
        let config = PipelineConfig::default();
        let ext = config.external_table();
        assert_eq!(
            ext.to_string(),
            "nyc-taxi-project-12345.nyc_taxi_data.external_yellow_tripdata"
        );
        assert_eq!(
            ext.bigquery_ident(),
            "`nyc-taxi-project-12345.nyc_taxi_data.external_yellow_tripdata`"
        );
        assert_eq!(
            config.optimized_table().duckdb_ident(),
            "\"nyc_taxi_data\".\"yellow_tripdata\""
        );
    }

    #[test]
    fn test_apply_env() {
        let mut config = PipelineConfig::default();
        config
            .apply_env(env(&[
                ("GCP_PROJECT_ID", "my-project-01"),
                ("NYC_TAXI_PERIODS", "2022-11,2022-12"),
                ("NYC_TAXI_WAREHOUSE", "duckdb"),
                ("NYC_TAXI_RETRY_DELAY_SECS", "7"),
                ("NYC_TAXI_BUCKET", ""),
            ]))
            .unwrap();

        assert_eq!(config.project_id, "my-project-01");
        assert_eq!(config.bucket(), "my-project-01_data_lake");
        assert_eq!(config.periods, vec![period("2022-11"), period("2022-12")]);
        assert_eq!(config.warehouse.backend, WarehouseBackend::DuckDb);
        assert_eq!(config.retry.delay_secs, 7);
    }

    #[test]
    fn test_apply_env_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        assert!(config
            .apply_env(env(&[("NYC_TAXI_PERIODS", "2023-1")]))
            .is_err());
        assert!(config
            .apply_env(env(&[("NYC_TAXI_RETRIES", "many")]))
            .is_err());
        assert!(config
            .apply_env(env(&[("NYC_TAXI_WAREHOUSE", "snowflake")]))
            .is_err());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r"
project_id: demo-project-42
dataset: trips
periods: ['2024-01']
staging:
  url: /tmp/lake
warehouse:
  backend: duckdb
  optimized_table: trips_optimized
retry:
  retries: 2
  delay_secs: 1
";
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.project_id, "demo-project-42");
        assert_eq!(config.dataset, "trips");
        assert_eq!(config.periods, vec![period("2024-01")]);
        assert_eq!(config.staging_url(), "/tmp/lake");
        assert_eq!(config.staging.prefix, "yellow_tripdata");
        assert_eq!(config.warehouse.backend, WarehouseBackend::DuckDb);
        assert_eq!(config.warehouse.external_table, "external_yellow_tripdata");
        assert_eq!(config.warehouse.optimized_table, "trips_optimized");
        assert_eq!(config.retry.retries, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = PipelineConfig::default();
        config.periods.clear();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.periods.push(period("2023-01"));
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.dataset = "taxi; DROP TABLE x".to_string();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.warehouse.optimized_table = config.warehouse.external_table.clone();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.project_id = "Bad_Project".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_pattern_missing_cleaned_files() {
        let mut config = PipelineConfig::default();
        config.staging.pattern = "cleaned_*.parquet".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfigValue { ref field, .. } if field == "staging.pattern"
        ));

        let mut config = PipelineConfig::default();
        config.staging.pattern = "processed_[.parquet".to_string();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.staging.pattern = "processed_yellow_tripdata_2023-0?.parquet".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let mut config = PipelineConfig::default();
        config.source.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidUrl(_))));

        let mut config = PipelineConfig::default();
        config.warehouse.api_url = "bigquery/v2".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_processed_glob_escapes_scratch_dir() {
        let config = PipelineConfig::default();
        let scratch = Path::new("/tmp/run[1]");
        let glob = config.processed_glob(scratch);
        assert_eq!(glob, "/tmp/run[[]1[]]/processed_*.parquet");

        let pattern = glob::Pattern::new(&glob).unwrap();
        assert!(pattern.matches_path(&config.processed_path(scratch, &period("2023-01"))));
    }

    #[test]
    fn test_missing_yaml_file() {
        let result = PipelineConfig::from_yaml_file(Path::new("/nonexistent/pipeline.yaml"));
        assert!(result.is_err());
    }
}
