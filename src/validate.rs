//! Job input validation.
//!
//! Turns the raw, untyped job payload into a [`JobRequest`]. Accepts either a
//! JSON object or a string containing JSON (some callers double-encode the
//! payload). Nothing here touches the network or filesystem.

use crate::types::{AppError, AppResult, InlineImage, JobRequest, RemoteFile};
use serde_json::Value;

/// Validate a raw job payload.
///
/// Errors carry the exact message the caller sees, so they are phrased for
/// humans ("Missing 'workflow' parameter") rather than for logs.
pub fn validate_input(job_input: Option<&Value>) -> AppResult<JobRequest> {
    let job_input = job_input.ok_or_else(|| invalid("Please provide input"))?;

    // A string payload must itself parse as JSON
    let parsed;
    let job_input = match job_input {
        Value::String(raw) => {
            parsed = serde_json::from_str::<Value>(raw)
                .map_err(|_| invalid("Invalid JSON format in input"))?;
            &parsed
        }
        other => other,
    };

    let workflow = job_input
        .get("workflow")
        .filter(|w| !w.is_null())
        .cloned()
        .ok_or_else(|| invalid("Missing 'workflow' parameter"))?;

    let images = match job_input.get("images") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => parse_images(value)?,
    };

    let files = match job_input.get("files") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => parse_files(value)?,
    };

    Ok(JobRequest { workflow, images, files })
}

fn parse_images(value: &Value) -> AppResult<Vec<InlineImage>> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid("'images' must be a list of objects with 'name' and 'image' keys"))?;

    let mut images = Vec::with_capacity(items.len());
    for item in items {
        let name = item.get("name").and_then(Value::as_str);
        let image = item.get("image").and_then(Value::as_str);
        match (name, image) {
            (Some(name), Some(image)) => images.push(InlineImage {
                name: name.to_string(),
                image: image.to_string(),
            }),
            _ => {
                return Err(invalid(
                    "'images' must be a list of objects with 'name' and 'image' keys",
                ))
            }
        }
    }
    Ok(images)
}

fn parse_files(value: &Value) -> AppResult<Vec<RemoteFile>> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid("'files' must be a list"))?;

    let mut files = Vec::with_capacity(items.len());
    for item in items {
        let name = item
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("Each file must have a 'name' field"))?;
        let url = item
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("Each file must have a 'url' field"))?;
        files.push(RemoteFile {
            name: name.to_string(),
            url: url.to_string(),
        });
    }
    Ok(files)
}

fn invalid(message: &str) -> AppError {
    AppError::InvalidInput(message.to_string())
}
