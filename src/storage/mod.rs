//! Object storage for generated media.
//!
//! The worker only ever uploads: one call per output artifact, keyed under the
//! job id. [`ObjectStore`] is the seam the materializer talks to; [`S3Store`]
//! is the S3-compatible implementation used in production.

use crate::config::StorageConfig;
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use std::path::Path;
use tracing::info;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file under a job-scoped key and return its URL.
    async fn upload(&self, job_id: &str, local_path: &Path) -> AppResult<String>;
}

pub struct S3Store {
    bucket: Box<Bucket>,
    endpoint_url: String,
    bucket_name: String,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> AppResult<Self> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint_url.clone(),
        };
        let credentials = Credentials::new(
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Storage(format!("invalid credentials: {}", e)))?;

        let bucket = Bucket::new(&config.bucket_name, region, credentials)
            .map_err(|e| AppError::Storage(e.to_string()))?
            .with_path_style();

        Ok(Self {
            bucket: Box::new(bucket),
            endpoint_url: config.endpoint_url.trim_end_matches('/').to_string(),
            bucket_name: config.bucket_name.clone(),
        })
    }

    fn object_key(job_id: &str, local_path: &Path) -> String {
        let filename = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}", job_id, filename)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint_url, self.bucket_name, key)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload(&self, job_id: &str, local_path: &Path) -> AppResult<String> {
        let key = Self::object_key(job_id, local_path);
        let content = tokio::fs::read(local_path).await?;
        let content_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();

        let response = self
            .bucket
            .put_object_with_content_type(&key, &content, &content_type)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        if response.status_code() != 200 {
            return Err(AppError::Storage(format!(
                "upload of {} returned status {}",
                key,
                response.status_code()
            )));
        }

        let url = self.object_url(&key);
        info!("uploaded {} to {}", key, url);
        Ok(url)
    }
}
