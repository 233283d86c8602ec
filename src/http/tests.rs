//! Tests for the HTTP client module

use super::*;
use crate::auth::AuthConfig;
use crate::error::Error;
use crate::types::BackoffType;
use reqwest::Method;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, retries: u32) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .max_retries(retries)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(5),
            Duration::from_millis(5),
        )
        .build();
    HttpClient::with_config(config).unwrap()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 0);
    assert!(config.base_url.is_none());
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://bigquery.googleapis.com/bigquery/v2")
        .timeout(Duration::from_secs(60))
        .max_retries(5)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .build();

    assert_eq!(
        config.base_url.as_deref(),
        Some("https://bigquery.googleapis.com/bigquery/v2")
    );
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert_eq!(config.initial_backoff, Duration::from_millis(200));
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new()
        .query("location", "US")
        .json(serde_json::json!({"key": "value"}));

    assert_eq!(
        config.query,
        vec![("location".to_string(), "US".to_string())]
    );
    assert!(config.body.is_some());
}

#[tokio::test]
async fn test_http_client_get_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/trip-data/yellow_tripdata_2023-01.parquet"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PAR1".to_vec()))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 0);
    let response = client
        .get("/trip-data/yellow_tripdata_2023-01.parquet")
        .await
        .unwrap();
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"PAR1");
}

#[tokio::test]
async fn test_http_client_get_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/projects/p/datasets/d/tables/t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "EXTERNAL",
            "numRows": "0"
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 0);
    let json: serde_json::Value = client
        .get_json("/projects/p/datasets/d/tables/t")
        .await
        .unwrap();
    assert_eq!(json["type"], "EXTERNAL");
}

#[tokio::test]
async fn test_http_client_post() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/p/jobs"))
        .and(body_json(serde_json::json!({"configuration": {"query": {"query": "SELECT 1"}}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jobReference": {"jobId": "job_1"}
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 0);
    let response = client
        .post(
            "/projects/p/jobs",
            serde_json::json!({"configuration": {"query": {"query": "SELECT 1"}}}),
        )
        .await
        .unwrap();
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["jobReference"]["jobId"], "job_1");
}

#[tokio::test]
async fn test_http_client_query_params() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/projects/p/jobs/job_1"))
        .and(query_param("location", "US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": {"state": "DONE"}
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 0);
    let json: serde_json::Value = client
        .request_json(
            Method::GET,
            "/projects/p/jobs/job_1",
            RequestConfig::new().query("location", "US"),
        )
        .await
        .unwrap();
    assert_eq!(json["status"]["state"], "DONE");
}

#[tokio::test]
async fn test_http_client_sends_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header(
            "User-Agent",
            concat!("nyc-taxi-pipeline/", env!("CARGO_PKG_VERSION")),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 0);
    assert_eq!(client.get("/data").await.unwrap().status(), 200);
}

#[tokio::test]
async fn test_http_client_bearer_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("Authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .build();
    let client = HttpClient::with_auth(
        config,
        AuthConfig::Bearer {
            token: "token-123".to_string(),
        },
    )
    .unwrap();

    client.get("/secure").await.unwrap();
}

#[tokio::test]
async fn test_http_client_404_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/trip-data/missing.parquet"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 0);
    let err = client.get("/trip-data/missing.parquet").await.unwrap_err();
    match err {
        Error::HttpStatus { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Not Found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_http_client_no_retry_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 0);
    let err = client.get("/flaky").await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_http_client_retry_on_500() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 3);
    let response = client.get("/flaky").await.unwrap();
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_http_client_max_retries_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 2);
    let err = client.get("/down").await.unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 502, .. }));
}

#[tokio::test]
async fn test_http_client_full_url_ignores_base() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/absolute"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url("https://unused.example.com")
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let url = format!("{}/absolute", mock_server.uri());
    assert_eq!(client.get(&url).await.unwrap().status(), 200);
}

fn backoff_config(backoff: BackoffType, max: Duration) -> HttpClientConfig {
    HttpClientConfig::builder()
        .backoff(backoff, Duration::from_millis(100), max)
        .build()
}

#[test]
fn test_backoff_constant() {
    let config = backoff_config(BackoffType::Constant, Duration::from_secs(10));
    assert_eq!(config.backoff_for(0), Duration::from_millis(100));
    assert_eq!(config.backoff_for(5), Duration::from_millis(100));
}

#[test]
fn test_backoff_linear() {
    let config = backoff_config(BackoffType::Linear, Duration::from_secs(10));
    assert_eq!(config.backoff_for(0), Duration::from_millis(100));
    assert_eq!(config.backoff_for(2), Duration::from_millis(300));
}

#[test]
fn test_backoff_exponential() {
    let config = backoff_config(BackoffType::Exponential, Duration::from_secs(10));
    assert_eq!(config.backoff_for(0), Duration::from_millis(100));
    assert_eq!(config.backoff_for(1), Duration::from_millis(200));
    assert_eq!(config.backoff_for(3), Duration::from_millis(800));
}

#[test]
fn test_backoff_respects_max() {
    let config = backoff_config(BackoffType::Exponential, Duration::from_millis(500));
    assert_eq!(config.backoff_for(10), Duration::from_millis(500));
    assert_eq!(config.backoff_for(40), Duration::from_millis(500));
}

#[test]
fn test_http_client_debug() {
    let client = HttpClient::with_config(HttpClientConfig::default()).unwrap();
    let debug = format!("{client:?}");
    assert!(debug.contains("HttpClient"));
    assert!(debug.contains("has_authenticator: false"));
}

#[tokio::test]
async fn test_http_client_does_not_retry_client_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/p/datasets/d/tables"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid schema"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 3);
    let err = client
        .post("/projects/p/datasets/d/tables", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 400, ref body } if body == "invalid schema"));
}
