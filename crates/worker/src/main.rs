use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gristmill_core::{
    load_config, maintenance, parse_batch, validate_config, BatchRunner, Config, HttpObjectStore,
    HttpStreamPublisher, ObjectStore, StreamPublisher,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!("Usage: gristmill <batch-file> [--serial] | clear-scratch | probe");
    };

    // Determine config path
    let config_path = std::env::var("GRISTMILL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    info!(version = VERSION, "Configuration loaded successfully");

    match command.as_str() {
        "clear-scratch" => {
            let report = maintenance::clear_scratch(&config.runner.scratch_root)
                .await
                .context("Failed to clear scratch root")?;
            println!("{}", serde_json::to_string(&report)?);
            Ok(())
        }
        "probe" => {
            let report = maintenance::probe_resources().await;
            println!("{}", serde_json::to_string(&report)?);
            Ok(())
        }
        batch_file => {
            let serial = args.iter().any(|arg| arg == "--serial");
            run_batch_file(config, batch_file, serial).await
        }
    }
}

/// Parse one job record per line from the batch file and run the batch.
async fn run_batch_file(config: Config, batch_file: &str, serial: bool) -> Result<()> {
    let raw = tokio::fs::read_to_string(batch_file)
        .await
        .with_context(|| format!("Failed to read batch file {}", batch_file))?;
    let records: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let batch = parse_batch(&records);
    if batch.is_empty() {
        bail!("Batch file {} contains no valid job records", batch_file);
    }

    let store: Arc<dyn ObjectStore> = Arc::new(
        HttpObjectStore::new(config.storage).context("Failed to create object store client")?,
    );
    let publisher: Arc<dyn StreamPublisher> = Arc::new(
        HttpStreamPublisher::new(config.stream).context("Failed to create stream publisher")?,
    );
    let runner = BatchRunner::new(config.runner, store, publisher);

    let report = if serial {
        runner.run_serial(batch).await
    } else {
        runner.run_batch(batch).await
    };

    for outcome in &report.outcomes {
        info!(
            job_id = %outcome.job_id,
            status = outcome.status.as_str(),
            acked = outcome.acked,
            "Job outcome"
        );
    }
    info!(
        completed = report.completed(),
        failed = report.failed(),
        artifacts_fetched = report.artifacts_fetched,
        outputs_uploaded = report.outputs_uploaded,
        "Worker invocation finished"
    );

    if report.failed() > 0 {
        bail!("{} of {} jobs failed", report.failed(), report.outcomes.len());
    }
    Ok(())
}
