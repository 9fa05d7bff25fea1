//! HTTP client for the ComfyUI API.
//!
//! Covers the three endpoints the worker drives: the readiness probe (`GET /`),
//! workflow submission (`POST /prompt`) and history lookup
//! (`GET /history/{prompt_id}`). The workflow graph itself is opaque to this
//! module; it is forwarded verbatim under the `prompt` key.

pub mod poll;

use crate::config::RetryPolicy;
use crate::types::{AppError, AppResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, info};

pub struct ComfyClient {
    client: reqwest::Client,
    base_url: String,
}

/// One entry in the `/history/{id}` response, keyed by prompt id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    /// Node id -> node output record. Empty until the job has produced output.
    #[serde(default)]
    pub outputs: serde_json::Map<String, Value>,
}

pub type History = HashMap<String, HistoryEntry>;

impl ComfyClient {
    /// `base_url` includes the scheme, e.g. `http://127.0.0.1:8188`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the API root until it answers 200, up to `policy.max_attempts`
    /// probes with a fixed delay in between. Connection errors count as failed
    /// attempts. Returns false on exhaustion, never an error.
    pub async fn wait_ready(&self, policy: &RetryPolicy) -> bool {
        for attempt in 0..policy.max_attempts {
            match self.client.get(&self.base_url).send().await {
                Ok(response) if response.status() == reqwest::StatusCode::OK => {
                    info!("ComfyUI API is reachable");
                    return true;
                }
                Ok(response) => {
                    debug!(status = %response.status(), attempt, "API probe not ready");
                }
                Err(e) => {
                    debug!(error = %e, attempt, "API probe failed");
                }
            }
            tokio::time::sleep(policy.interval()).await;
        }

        error!(
            "Failed to connect to server at {} after {} attempts",
            self.base_url, policy.max_attempts
        );
        false
    }

    /// Queue a workflow for execution and return the engine-issued prompt id.
    pub async fn queue_workflow(&self, workflow: &Value) -> AppResult<String> {
        let url = format!("{}/prompt", self.base_url);
        let body = serde_json::json!({ "prompt": workflow });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Submission(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Submission(format!("{}: {}", status, text)));
        }

        let queued: Value = response
            .json()
            .await
            .map_err(|e| AppError::Submission(format!("invalid response: {}", e)))?;

        let prompt_id = queued
            .get("prompt_id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Submission("response is missing 'prompt_id'".to_string()))?;

        info!("queued workflow with ID {}", prompt_id);
        Ok(prompt_id.to_string())
    }

    /// Fetch the history record for a prompt id. An id the engine has not
    /// finished (or never seen) simply has no entry in the returned map.
    pub async fn get_history(&self, prompt_id: &str) -> AppResult<History> {
        let url = format!("{}/history/{}", self.base_url, prompt_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Poll(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Poll(format!("{}: {}", status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Poll(format!("invalid history response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { interval_ms: 1, max_attempts }
    }

    #[tokio::test]
    async fn test_wait_ready_succeeds_on_200() {
        let mut server = mockito::Server::new_async().await;
        let probe = server.mock("GET", "/").with_status(200).create_async().await;

        let client = ComfyClient::new(server.url());
        assert!(client.wait_ready(&fast_policy(3)).await);
        probe.assert_async().await;
    }

    #[tokio::test]
    async fn test_wait_ready_returns_false_after_exhaustion() {
        let mut server = mockito::Server::new_async().await;
        let probe = server
            .mock("GET", "/")
            .with_status(503)
            .expect(4)
            .create_async()
            .await;

        let client = ComfyClient::new(server.url());
        let start = std::time::Instant::now();
        assert!(!client.wait_ready(&fast_policy(4)).await);
        // fixed delay after every failed probe
        assert!(start.elapsed() >= std::time::Duration::from_millis(4));
        probe.assert_async().await;
    }

    #[tokio::test]
    async fn test_queue_workflow_returns_prompt_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/prompt")
            .match_body(mockito::Matcher::Json(json!({"prompt": {"3": {}}})))
            .with_status(200)
            .with_body(r#"{"prompt_id": "abc-123", "number": 0}"#)
            .create_async()
            .await;

        let client = ComfyClient::new(server.url());
        let id = client.queue_workflow(&json!({"3": {}})).await.unwrap();
        assert_eq!(id, "abc-123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_queue_workflow_missing_id_is_submission_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/prompt")
            .with_status(200)
            .with_body(r#"{"number": 0}"#)
            .create_async()
            .await;

        let client = ComfyClient::new(server.url());
        let err = client.queue_workflow(&json!({})).await.unwrap_err();
        assert!(matches!(err, AppError::Submission(_)));
    }

    #[tokio::test]
    async fn test_queue_workflow_rejection_is_submission_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/prompt")
            .with_status(400)
            .with_body(r#"{"error": "invalid prompt"}"#)
            .create_async()
            .await;

        let client = ComfyClient::new(server.url());
        let err = client.queue_workflow(&json!({})).await.unwrap_err();
        assert!(matches!(err, AppError::Submission(_)));
        assert!(err.to_string().contains("invalid prompt"));
    }

    #[tokio::test]
    async fn test_get_history_parses_outputs() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/history/abc-123")
            .with_status(200)
            .with_body(
                r#"{"abc-123": {"outputs": {"9": {"images": [{"filename": "out.png"}]}}}}"#,
            )
            .create_async()
            .await;

        let client = ComfyClient::new(server.url());
        let history = client.get_history("abc-123").await.unwrap();
        let entry = history.get("abc-123").unwrap();
        assert!(entry.outputs.contains_key("9"));
    }

    #[tokio::test]
    async fn test_get_history_empty_for_unknown_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/history/nope")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = ComfyClient::new(server.url());
        let history = client.get_history("nope").await.unwrap();
        assert!(history.is_empty());
    }
}
