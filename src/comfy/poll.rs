//! Completion polling.
//!
//! Watches `/history/{prompt_id}` until the entry for the awaited id reports a
//! non-empty `outputs` map, sleeping a fixed interval between ticks. Retry
//! exhaustion is a distinct outcome (`PollExhausted`) from a transport or
//! parse failure (`Poll`), which aborts immediately.

use super::ComfyClient;
use crate::config::RetryPolicy;
use crate::types::{AppError, AppResult};
use serde_json::Value;
use tracing::{debug, info};

/// Poll until the job identified by `prompt_id` has outputs, returning the
/// node-id -> output-record map.
pub async fn poll_for_outputs(
    client: &ComfyClient,
    prompt_id: &str,
    policy: &RetryPolicy,
) -> AppResult<serde_json::Map<String, Value>> {
    info!("waiting until image generation is complete");

    let mut retries = 0;
    while retries < policy.max_attempts {
        let mut history = client.get_history(prompt_id).await?;

        if let Some(entry) = history.remove(prompt_id) {
            if !entry.outputs.is_empty() {
                debug!(retries, "generation complete");
                return Ok(entry.outputs);
            }
        }

        tokio::time::sleep(policy.interval()).await;
        retries += 1;
    }

    Err(AppError::PollExhausted)
}
