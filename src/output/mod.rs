//! Output materialization.
//!
//! Walks the engine's reported outputs for every node, collects the artifacts
//! under the recognized output categories (stills under `images`, animated
//! media under `gifs`, direct video under `videos`), and delivers each one to
//! the caller. Delivery mode is chosen once per job: an object store when one
//! is configured, inline base64 otherwise. Individual artifact failures never
//! stop the rest of the batch.

use crate::storage::ObjectStore;
use crate::types::{AppError, AppResult, MaterializedFile, OutputArtifact, Status};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;
use std::path::Path;
use tracing::{error, info, warn};

/// JobResult-shaped partial: status, summary message and the per-file list,
/// without the process-wide refresh flag the orchestrator attaches.
#[derive(Debug)]
pub struct MaterializeOutcome {
    pub status: Status,
    pub message: String,
    pub files: Vec<MaterializedFile>,
}

/// Collect every artifact the engine reported, across all nodes and all
/// recognized categories. Items without a filename are skipped with a warning.
pub fn discover_artifacts(
    outputs: &serde_json::Map<String, Value>,
    categories: &[String],
) -> Vec<OutputArtifact> {
    let mut artifacts = Vec::new();

    for (node_id, node_output) in outputs {
        for category in categories {
            let Some(items) = node_output.get(category).and_then(Value::as_array) else {
                continue;
            };

            for item in items {
                let Some(filename) = item.get("filename").and_then(Value::as_str) else {
                    warn!("missing filename in {} output from node {}", category, node_id);
                    continue;
                };
                let subfolder = item.get("subfolder").and_then(Value::as_str).unwrap_or("");
                let path = if subfolder.is_empty() {
                    filename.to_string()
                } else {
                    format!("{}/{}", subfolder, filename)
                };

                artifacts.push(OutputArtifact {
                    path,
                    kind: item
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                    format: item
                        .get("format")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                });
            }

            info!("found {} {} in node {}", items.len(), category, node_id);
        }
    }

    artifacts
}

/// Deliver every discovered artifact, either by uploading to `store` or by
/// inline base64 encoding when no store is configured.
///
/// Fails hard only when the engine reported zero artifacts; per-artifact
/// problems become error entries in the returned file list. At least one
/// delivered artifact makes the overall outcome a success, with the first
/// success's payload as the summary message.
pub async fn materialize_outputs(
    outputs: &serde_json::Map<String, Value>,
    job_id: &str,
    output_dir: &Path,
    categories: &[String],
    store: Option<&dyn ObjectStore>,
) -> AppResult<MaterializeOutcome> {
    let artifacts = discover_artifacts(outputs, categories);
    if artifacts.is_empty() {
        error!("no output files found in workflow results");
        return Err(AppError::NoOutputs);
    }

    info!("processing {} output file(s)", artifacts.len());

    let mut files = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        files.push(materialize_one(artifact, job_id, output_dir, store).await);
    }

    let first_success = files
        .iter()
        .find(|f| f.status == Status::Success)
        .and_then(|f| f.payload())
        .map(str::to_string);

    match first_success {
        Some(payload) => Ok(MaterializeOutcome {
            status: Status::Success,
            message: payload,
            files,
        }),
        None => Ok(MaterializeOutcome {
            status: Status::Error,
            message: "All output files failed to process".to_string(),
            files,
        }),
    }
}

async fn materialize_one(
    artifact: &OutputArtifact,
    job_id: &str,
    output_dir: &Path,
    store: Option<&dyn ObjectStore>,
) -> MaterializedFile {
    let local_path = output_dir.join(&artifact.path);
    let filename = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| artifact.path.clone());

    info!("processing {} at {}", filename, local_path.display());

    if tokio::fs::metadata(&local_path).await.is_err() {
        let message = format!("File not found: {}", local_path.display());
        error!("{}", message);
        return MaterializedFile::failed(filename, message);
    }

    let delivered = match store {
        Some(store) => store
            .upload(job_id, &local_path)
            .await
            .map(|url| (Some(url), None)),
        None => tokio::fs::read(&local_path)
            .await
            .map(|bytes| (None, Some(BASE64.encode(&bytes))))
            .map_err(AppError::from),
    };

    match delivered {
        Ok((url, data)) => MaterializedFile {
            filename,
            status: Status::Success,
            url,
            data,
            error: None,
            kind: Some(artifact.kind.clone()),
            format: Some(artifact.format.clone()),
        },
        Err(e) => {
            let message = format!("Failed to process {}: {}", filename, e);
            error!("{}", message);
            MaterializedFile::failed(filename, message)
        }
    }
}
