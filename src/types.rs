// Type definitions and enums

use serde::{Deserialize, Serialize};

/// Overall status of a job or of a single processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::Error => write!(f, "error"),
        }
    }
}

/// An input image supplied inline as base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineImage {
    /// Filename the image is stored under in the ComfyUI input folder
    pub name: String,
    /// Base64 encoded image bytes
    pub image: String,
}

/// An input file fetched from a remote URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Filename the download is saved as
    pub name: String,
    /// Source URL
    pub url: String,
}

/// A validated job request, produced by [`crate::validate::validate_input`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Opaque workflow graph, passed through to ComfyUI unmodified
    pub workflow: serde_json::Value,
    #[serde(default)]
    pub images: Vec<InlineImage>,
    #[serde(default)]
    pub files: Vec<RemoteFile>,
}

/// Outcome of one ingestion stage (image upload or URL download).
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub status: Status,
    pub message: String,
    /// One entry per processed item, in input order
    pub details: Vec<String>,
}

impl StageOutcome {
    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }
}

/// One output file discovered in the engine's reported outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Path relative to the ComfyUI output folder (subfolder joined with filename)
    pub path: String,
    /// Engine-declared category, e.g. "image", "gif", "video"
    pub kind: String,
    /// Engine-declared container/codec, e.g. "image/png", "video/h264-mp4"
    pub format: String,
}

/// The per-file result of output materialization.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedFile {
    pub filename: String,
    pub status: Status,
    /// Storage reference, present in S3 delivery mode on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base64 encoded bytes, present in inline delivery mode on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl MaterializedFile {
    /// The success payload: the storage URL or the inline data, whichever is set.
    pub fn payload(&self) -> Option<&str> {
        self.url.as_deref().or(self.data.as_deref())
    }

    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: Status::Error,
            url: None,
            data: None,
            error: Some(error.into()),
            kind: None,
            format: None,
        }
    }
}

/// Terminal result of one job, returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub status: Status,
    /// Human summary on error; on success, the first successful file's payload
    /// for backward single-artifact compatibility
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<MaterializedFile>,
    pub refresh_worker: bool,
}

impl JobResult {
    pub fn error(message: impl Into<String>, refresh_worker: bool) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            files: Vec::new(),
            refresh_worker,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Error queuing workflow: {0}")]
    Submission(String),

    #[error("Error waiting for image generation: {0}")]
    Poll(String),

    #[error("Max retries reached while waiting for image generation")]
    PollExhausted,

    #[error("No output files found in workflow results")]
    NoOutputs,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = std::result::Result<T, AppError>;
