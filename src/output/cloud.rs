//! Object storage destinations (GCS, S3, R2, Azure, local)

use crate::error::{Error, Result};
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;

/// Object storage destination parsed from a URL
#[derive(Debug, Clone)]
pub struct StagingDestination {
    store: Arc<dyn ObjectStore>,
    /// Key prefix within the bucket/container
    prefix: String,
    /// URL the staged URIs are built from, without trailing slash
    base_uri: String,
    scheme: String,
}

impl StagingDestination {
    /// Parse a destination URL and create the matching object store
    ///
    /// `gs://`, `s3://`, `r2://` and `az://` URLs name a bucket (container)
    /// followed by an optional key prefix. Anything else, including
    /// `file://` URLs, is a local directory, created if missing.
    /// Cloud credentials come from each backend's `from_env` builder.
    pub fn parse(url: &str) -> Result<Self> {
        let Some((scheme, rest)) = url.split_once("://").filter(|(s, _)| *s != "file") else {
            return Self::local(url.strip_prefix("file://").unwrap_or(url));
        };
        let rest = rest.trim_end_matches('/');
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));

        let store: Arc<dyn ObjectStore> = match scheme {
            "gs" => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| store_err(scheme, e))?,
            ),
            "s3" | "r2" => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                // https://<account_id>.r2.cloudflarestorage.com
                if scheme == "r2" {
                    if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                        builder = builder.with_endpoint(endpoint);
                    }
                }
                Arc::new(builder.build().map_err(|e| store_err(scheme, e))?)
            }
            "az" => Arc::new(
                MicrosoftAzureBuilder::from_env()
                    .with_container_name(bucket)
                    .build()
                    .map_err(|e| store_err(scheme, e))?,
            ),
            other => {
                return Err(Error::invalid_value(
                    "staging.url",
                    format!("unsupported scheme '{other}'"),
                ))
            }
        };

        Ok(Self {
            store,
            prefix: prefix.trim_matches('/').to_string(),
            base_uri: format!("{scheme}://{rest}"),
            scheme: scheme.to_string(),
        })
    }

    /// Wrap an existing store; used for in-memory destinations in tests
    pub fn from_store(store: Arc<dyn ObjectStore>, base_uri: impl Into<String>) -> Self {
        Self {
            store,
            prefix: String::new(),
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
            scheme: "memory".to_string(),
        }
    }

    fn local(path: &str) -> Result<Self> {
        std::fs::create_dir_all(path)
            .map_err(|e| Error::config(format!("Failed to create directory {path}: {e}")))?;
        let store = LocalFileSystem::new_with_prefix(path)
            .map_err(|e| store_err("file", e))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: String::new(),
            base_uri: path.trim_end_matches('/').to_string(),
            scheme: "file".to_string(),
        })
    }

    /// `gs`, `s3`, `r2`, `az`, `file` or `memory`
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// URI an object stored under `key` is addressable by
    pub fn uri_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_uri, key.trim_start_matches('/'))
    }

    fn object_path(&self, key: &str) -> ObjectPath {
        let key = key.trim_start_matches('/');
        if self.prefix.is_empty() {
            ObjectPath::from(key)
        } else {
            ObjectPath::from(format!("{}/{key}", self.prefix))
        }
    }

    /// Write bytes under `key`, replacing any existing object
    pub async fn put(&self, key: &str, data: Bytes) -> Result<String> {
        let path = self.object_path(key);
        self.store
            .put(&path, data.into())
            .await
            .map_err(|e| Error::transfer(format!("Failed to write {}: {e}", self.uri_for(key))))?;
        Ok(self.uri_for(key))
    }

    /// Check whether an object exists under `key`
    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.store.head(&self.object_path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(Error::transfer(format!(
                "Failed to stat {}: {e}",
                self.uri_for(key)
            ))),
        }
    }
}

fn store_err(scheme: &str, e: object_store::Error) -> Error {
    Error::config(format!("Failed to create {scheme} object store: {e}"))
}
