//! Common types used throughout the pipeline
//!
//! This module contains shared type definitions used across multiple
//! stages: the `Period` identifier, backend selectors and small utilities.

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

// ============================================================================
// Period
// ============================================================================

/// Regex for matching a period: YYYY-MM
static PERIOD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());

/// A calendar year-month, e.g. `2023-01`
///
/// Drives source URLs, scratch filenames and staged object keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Create a period, validating the month
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|d| Self {
                year: d.year(),
                month: d.month(),
            })
            .ok_or_else(|| Error::invalid_value("period", format!("{year:04}-{month:02}")))
    }

    /// Calendar year
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month (1-12)
    pub fn month(&self) -> u32 {
        self.month
    }

    /// First day of the period
    pub fn first_day(&self) -> NaiveDate {
        // Validated in `new`
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let caps = PERIOD_REGEX
            .captures(s.trim())
            .ok_or_else(|| Error::invalid_value("period", format!("expected YYYY-MM, got '{s}'")))?;
        let year: i32 = caps[1]
            .parse()
            .map_err(|_| Error::invalid_value("period", s))?;
        let month: u32 = caps[2]
            .parse()
            .map_err(|_| Error::invalid_value("period", s))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for Period {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

/// Parse a comma-separated period list (`2023-01,2023-02`)
pub fn parse_period_list(s: &str) -> Result<Vec<Period>> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::parse)
        .collect()
}

// ============================================================================
// Warehouse Backend
// ============================================================================

/// Which warehouse implementation backs the catalog and materialize stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseBackend {
    /// Google BigQuery over its REST API
    #[default]
    #[value(name = "bigquery")]
    #[serde(rename = "bigquery")]
    BigQuery,
    /// Local DuckDB database file
    #[value(name = "duckdb")]
    #[serde(rename = "duckdb")]
    DuckDb,
}

impl FromStr for WarehouseBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bigquery" | "bq" => Ok(Self::BigQuery),
            "duckdb" => Ok(Self::DuckDb),
            other => Err(Error::invalid_value(
                "warehouse.backend",
                format!("unknown backend '{other}'"),
            )),
        }
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for request retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// JWT Algorithm
// ============================================================================

/// JWT signing algorithm for service-account assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JwtAlgorithm {
    /// RSA using SHA-256
    #[default]
    RS256,
    /// RSA using SHA-384
    RS384,
    /// RSA using SHA-512
    RS512,
}

impl From<JwtAlgorithm> for jsonwebtoken::Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::RS256 => jsonwebtoken::Algorithm::RS256,
            JwtAlgorithm::RS384 => jsonwebtoken::Algorithm::RS384,
            JwtAlgorithm::RS512 => jsonwebtoken::Algorithm::RS512,
        }
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.trim().is_empty())
    }
}
