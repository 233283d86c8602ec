//! Error types for the taxi pipeline
//!
//! This module defines the error hierarchy for the whole crate.
//! Every stage returns `Result<T, Error>`; the orchestrator reports the
//! originating error of a failed run unchanged.

use thiserror::Error;

/// The main error type for the pipeline
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Stage Errors
    // ============================================================================
    #[error("Transfer failed: {message}")]
    Transfer { message: String },

    #[error("Malformed data in {path}: {message}")]
    MalformedData { path: String, message: String },

    #[error("Schema mismatch in {path}: {message}")]
    SchemaMismatch { path: String, message: String },

    #[error("Missing artifact: {path}")]
    MissingArtifact { path: String },

    #[error("Catalog error for table '{table}': {message}")]
    Catalog { table: String, message: String },

    #[error("Query execution failed: {message}")]
    QueryExecution { message: String },

    #[error("Invalid run state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Arrow/Parquet Errors
    // ============================================================================
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a transfer error
    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer {
            message: message.into(),
        }
    }

    /// Create a malformed data error
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedData {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a missing artifact error
    pub fn missing_artifact(path: impl Into<String>) -> Self {
        Self::MissingArtifact { path: path.into() }
    }

    /// Create a catalog error
    pub fn catalog(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Catalog {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a query execution error
    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Stable label for logs and run reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transfer { .. } => "transfer",
            Error::MalformedData { .. } => "malformed_data",
            Error::SchemaMismatch { .. } => "schema_mismatch",
            Error::MissingArtifact { .. } => "missing_artifact",
            Error::Catalog { .. } => "catalog",
            Error::QueryExecution { .. } => "query_execution",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::Config { .. } | Error::InvalidConfigValue { .. } => "config",
            Error::YamlParse(_) | Error::JsonParse(_) => "parse",
            Error::Auth { .. } => "auth",
            Error::Http(_) | Error::HttpStatus { .. } | Error::Timeout { .. } => "http",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Arrow(_) | Error::Parquet(_) => "data_format",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }

    /// Check if this error is retryable at the HTTP request level
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for the pipeline
pub type Result<T> = std::result::Result<T, Error>;
