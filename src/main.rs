use clap::Parser;
use comfy_worker::{Config, Worker};
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run one generation job against a local ComfyUI instance.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the job payload JSON; reads stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Job id used for storage keys; a random id is generated when omitted
    #[arg(long)]
    job_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comfy_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: engine at {}", config.comfy.base_url());

    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let payload: serde_json::Value = serde_json::from_str(&raw)?;

    let job_id = args
        .job_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!("Handling job {}", job_id);

    let worker = Worker::new(config)?;
    let result = worker.handle_job(Some(&payload), &job_id).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
