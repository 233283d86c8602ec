//! Stager: copy cleaned files into durable storage

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::output::StagingDestination;
use bytes::Bytes;
use glob::glob;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// One uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedObject {
    pub local_path: PathBuf,
    pub key: String,
    pub uri: String,
    pub bytes: u64,
}

/// Upload every cleaned file of the configured periods
///
/// All cleaned files must be present before the first upload starts. The
/// first failed upload aborts the stage.
pub async fn stage(
    config: &PipelineConfig,
    destination: &StagingDestination,
) -> Result<Vec<StagedObject>> {
    let scratch = &config.scratch_dir;
    let pattern = config.processed_glob(scratch);

    let matched: BTreeSet<PathBuf> = glob(&pattern)
        .map_err(|e| Error::invalid_value("staging.pattern", e.to_string()))?
        .filter_map(std::result::Result::ok)
        .collect();

    let expected: Vec<PathBuf> = config
        .periods
        .iter()
        .map(|p| config.processed_path(scratch, p))
        .collect();

    if let Some(missing) = expected.iter().find(|p| !matched.contains(*p)) {
        return Err(Error::missing_artifact(missing.display().to_string()));
    }
    for extra in matched.iter().filter(|p| !expected.contains(p)) {
        warn!("Skipping {}: not a configured period", extra.display());
    }

    info!(
        destination = destination.scheme(),
        files = expected.len(),
        "Staging cleaned files"
    );
    let mut staged = Vec::with_capacity(expected.len());
    for path in expected {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::missing_artifact(path.display().to_string()))?;
        let key = config.staged_key_for(&filename);

        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::transfer(format!("cannot read {}: {e}", path.display())))?;
        let bytes = data.len() as u64;

        let uri = destination.put(&key, Bytes::from(data)).await?;
        info!(key = %key, bytes, "Staged");

        staged.push(StagedObject {
            local_path: path,
            key,
            uri,
            bytes,
        });
    }

    Ok(staged)
}
