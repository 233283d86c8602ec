//! HTTP client used by the fetch stage and the BigQuery backend
//!
//! Request-level retries are off by default: downloads rely on the
//! orchestrator's whole-stage retry, while catalog calls opt into a couple of
//! retries on 429/5xx.

mod client;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};

#[cfg(test)]
mod tests;
