//! Fetcher: download one raw trip file per period into the scratch directory

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::output::partial_path;
use crate::types::Period;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// A raw file written by the fetcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedFile {
    pub period: Period,
    pub path: PathBuf,
    /// Length of the response body, equal to the file size
    pub bytes: u64,
}

/// Scratch directory handed from the fetcher to the cleaner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScratchLocation {
    pub dir: PathBuf,
    pub files: Vec<FetchedFile>,
}

/// Download every configured period. Any failed request fails the stage.
pub async fn fetch(config: &PipelineConfig, client: &HttpClient) -> Result<ScratchLocation> {
    let dir = config.scratch_dir.clone();
    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        Error::transfer(format!(
            "cannot create scratch directory {}: {e}",
            dir.display()
        ))
    })?;

    let mut files = Vec::with_capacity(config.periods.len());
    for period in &config.periods {
        let url = config.source_url(period);
        let path = config.raw_path(&dir, period);
        info!(period = %period, url = %url, "Downloading");

        let bytes = download(client, &url, &path).await?;
        info!(period = %period, path = %path.display(), bytes, "Downloaded");

        files.push(FetchedFile {
            period: *period,
            path,
            bytes,
        });
    }

    Ok(ScratchLocation { dir, files })
}

/// Stream the body of `url` into `path`
async fn download(client: &HttpClient, url: &str, path: &Path) -> Result<u64> {
    let partial = partial_path(path);
    let result = write_body(client, url, &partial).await;

    match result {
        Ok(bytes) => {
            tokio::fs::rename(&partial, path).await.map_err(|e| {
                Error::transfer(format!("cannot move {} into place: {e}", partial.display()))
            })?;
            Ok(bytes)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

async fn write_body(client: &HttpClient, url: &str, partial: &Path) -> Result<u64> {
    let transfer_err = |e: Error| Error::transfer(format!("GET {url}: {e}"));

    let mut response = client.get(url).await.map_err(transfer_err)?;
    let expected = response.content_length();

    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| transfer_err(e.into()))?;

    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| transfer_err(e.into()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| transfer_err(e.into()))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| transfer_err(e.into()))?;
    debug!("Wrote {} bytes to {}", written, partial.display());

    if let Some(expected) = expected {
        if expected != written {
            return Err(Error::transfer(format!(
                "GET {url}: body ended after {written} of {expected} bytes"
            )));
        }
    }

    Ok(written)
}
