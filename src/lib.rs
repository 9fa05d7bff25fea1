// Comfy Worker - job-execution bridge for a ComfyUI instance

pub mod comfy;
pub mod config;
pub mod handler;
pub mod ingest;
pub mod output;
pub mod storage;
pub mod types;
pub mod validate;

// Re-exports for convenience
pub use config::Config;
pub use handler::Worker;
pub use types::{JobResult, Status};
