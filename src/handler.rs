//! Job lifecycle orchestration.
//!
//! One [`Worker`] handles one job at a time end-to-end: validate the payload,
//! gate on engine readiness, ingest input assets, queue the workflow, poll for
//! completion and materialize the outputs. Every failure mode is folded into a
//! [`JobResult`] with error status; nothing escapes to the caller as a panic
//! or error value.

use crate::comfy::{poll::poll_for_outputs, ComfyClient};
use crate::config::Config;
use crate::ingest;
use crate::output::materialize_outputs;
use crate::storage::{ObjectStore, S3Store};
use crate::types::{AppResult, JobResult, StageOutcome};
use crate::validate::validate_input;
use serde_json::Value;
use std::path::Path;
use tracing::{error, info};

pub struct Worker {
    config: Config,
    comfy: ComfyClient,
    http: reqwest::Client,
    store: Option<Box<dyn ObjectStore>>,
}

impl Worker {
    /// Build a worker from configuration. The object store is constructed
    /// iff a storage section is present, which also selects delivery mode.
    pub fn new(config: Config) -> AppResult<Self> {
        let store = match &config.storage {
            Some(storage) => Some(Box::new(S3Store::new(storage)?) as Box<dyn ObjectStore>),
            None => None,
        };
        Ok(Self::with_store(config, store))
    }

    /// Construct with an explicit store (or none), bypassing S3 setup.
    pub fn with_store(config: Config, store: Option<Box<dyn ObjectStore>>) -> Self {
        let comfy = ComfyClient::new(config.comfy.base_url());
        Self {
            config,
            comfy,
            http: reqwest::Client::new(),
            store,
        }
    }

    /// Run one job to completion. `job_input` is the raw payload from the
    /// caller; `job_id` scopes storage keys and log lines.
    pub async fn handle_job(&self, job_input: Option<&Value>, job_id: &str) -> JobResult {
        let refresh_worker = self.config.refresh_worker;

        let request = match validate_input(job_input) {
            Ok(request) => request,
            Err(e) => return JobResult::error(e.to_string(), refresh_worker),
        };

        // Best effort: submission will surface the failure if the engine
        // really is down, so an exhausted gate does not abort the job.
        if !self.comfy.wait_ready(&self.config.comfy.gate).await {
            error!(job_id, "engine readiness gate exhausted, proceeding anyway");
        }

        let downloaded = ingest::download_files(
            &self.http,
            Path::new(&self.config.paths.input_dir),
            &request.files,
        )
        .await;
        if downloaded.is_error() {
            return stage_error(downloaded, refresh_worker);
        }

        let uploaded =
            ingest::upload_images(&self.http, self.comfy.base_url(), &request.images).await;
        if uploaded.is_error() {
            return stage_error(uploaded, refresh_worker);
        }

        let prompt_id = match self.comfy.queue_workflow(&request.workflow).await {
            Ok(id) => id,
            Err(e) => return JobResult::error(e.to_string(), refresh_worker),
        };

        let outputs =
            match poll_for_outputs(&self.comfy, &prompt_id, &self.config.comfy.polling).await {
                Ok(outputs) => outputs,
                Err(e) => return JobResult::error(e.to_string(), refresh_worker),
            };

        match materialize_outputs(
            &outputs,
            job_id,
            Path::new(&self.config.paths.output_dir),
            &self.config.paths.output_categories,
            self.store.as_deref(),
        )
        .await
        {
            Ok(outcome) => {
                info!(job_id, status = %outcome.status, "job finished");
                JobResult {
                    status: outcome.status,
                    message: outcome.message,
                    files: outcome.files,
                    refresh_worker,
                }
            }
            Err(e) => JobResult::error(e.to_string(), refresh_worker),
        }
    }
}

fn stage_error(outcome: StageOutcome, refresh_worker: bool) -> JobResult {
    let message = if outcome.details.is_empty() {
        outcome.message
    } else {
        format!("{}: {}", outcome.message, outcome.details.join("; "))
    };
    JobResult::error(message, refresh_worker)
}
