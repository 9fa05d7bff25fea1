use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub comfy: ComfyConfig,
    pub paths: PathsConfig,
    /// Present iff a bucket endpoint is configured; toggles S3 delivery mode
    pub storage: Option<StorageConfig>,
    /// Ask the platform to recycle the worker after this job completes
    pub refresh_worker: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComfyConfig {
    /// host:port of the ComfyUI instance
    pub host: String,
    pub gate: RetryPolicy,
    pub polling: RetryPolicy,
}

impl ComfyConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.host)
    }
}

/// Fixed-delay retry budget for the readiness gate and the completion poller.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryPolicy {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// ComfyUI input folder, where URL downloads land
    pub input_dir: String,
    /// ComfyUI output folder, where generated media is read from
    pub output_dir: String,
    /// Output categories recognized during artifact discovery
    pub output_categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint_url: String,
    pub bucket_name: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        // Presence of the endpoint toggles S3 delivery mode
        let storage = env::var("BUCKET_ENDPOINT_URL").ok().map(|endpoint_url| StorageConfig {
            endpoint_url,
            bucket_name: env::var("BUCKET_NAME").unwrap_or_default(),
            access_key_id: env::var("BUCKET_ACCESS_KEY_ID").ok(),
            secret_access_key: env::var("BUCKET_SECRET_ACCESS_KEY").ok(),
            region: env::var("BUCKET_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        });

        Ok(Self {
            comfy: ComfyConfig {
                host: env::var("COMFY_HOST").unwrap_or_else(|_| "127.0.0.1:8188".to_string()),
                gate: RetryPolicy {
                    interval_ms: env::var("COMFY_API_AVAILABLE_INTERVAL_MS")
                        .unwrap_or_else(|_| "50".to_string())
                        .parse()?,
                    max_attempts: env::var("COMFY_API_AVAILABLE_MAX_RETRIES")
                        .unwrap_or_else(|_| "500".to_string())
                        .parse()?,
                },
                polling: RetryPolicy {
                    interval_ms: env::var("COMFY_POLLING_INTERVAL_MS")
                        .unwrap_or_else(|_| "250".to_string())
                        .parse()?,
                    max_attempts: env::var("COMFY_POLLING_MAX_RETRIES")
                        .unwrap_or_else(|_| "500".to_string())
                        .parse()?,
                },
            },
            paths: PathsConfig {
                input_dir: env::var("COMFY_INPUT_PATH")
                    .unwrap_or_else(|_| "/comfyui/input".to_string()),
                output_dir: env::var("COMFY_OUTPUT_PATH")
                    .unwrap_or_else(|_| "/comfyui/output".to_string()),
                output_categories: default_output_categories(),
            },
            storage,
            refresh_worker: env::var("REFRESH_WORKER")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
        })
    }
}

pub fn default_output_categories() -> Vec<String> {
    ["images", "gifs", "videos"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
