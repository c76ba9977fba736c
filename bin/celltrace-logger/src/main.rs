//! Celltrace logger daemon
//!
//! Thin wrapper around the pipeline: loads the TOML configuration, merges
//! CLI overrides, wires a cell source and runs until interrupted.

use anyhow::Result;
use celltrace_common::Config;
use celltrace_pipeline::{CellSource, Pipeline, ReplayCellSource};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "celltrace-logger")]
#[command(about = "Celltrace cell observation logger")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "celltrace.toml")]
    config: String,

    /// Data directory for trace ring and cache files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// NDJSON file of raw cell records to replay as the cell source
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Reference dataset CSV
    #[arg(long)]
    reference_dataset: Option<PathBuf>,

    /// Export sink URL
    #[arg(long)]
    sink_url: Option<String>,

    /// Geolocation API token
    #[arg(long)]
    api_token: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config file if it exists
    let mut config: Config = if Path::new(&args.config).exists() {
        let config_str = std::fs::read_to_string(&args.config)?;
        toml::from_str(&config_str).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse config file: {e}");
            Config::default()
        })
    } else {
        Config::default()
    };

    // Merge CLI args with config file (CLI takes precedence)
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(reference_dataset) = args.reference_dataset {
        config.cache.reference_dataset = Some(reference_dataset);
    }
    if let Some(sink_url) = args.sink_url {
        config.export.sink_url = Some(sink_url);
    }
    if let Some(api_token) = args.api_token {
        config.geolocation.api_token = Some(api_token);
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting celltrace logger");
    info!("Config file: {}", args.config);
    info!("Data directory: {}", config.storage.data_dir.display());
    info!(
        "Ring: {} files x {} events",
        config.storage.max_files, config.storage.events_per_file
    );
    if config.geolocation.api_token.is_none() {
        info!("No geolocation token configured; resolution is local-only");
    }
    if config.export.sink_url.is_none() {
        info!("No sink configured; exports are disabled");
    }

    let source: Arc<dyn CellSource> = match &args.replay {
        Some(path) => {
            info!("Replaying cell records from {}", path.display());
            Arc::new(ReplayCellSource::from_file(path)?)
        }
        None => {
            warn!("No cell source configured; every scan will observe nothing");
            Arc::new(ReplayCellSource::from_snapshots(Vec::new()))
        }
    };

    let mut pipeline = Pipeline::new(config, source)?;
    pipeline.start();

    tokio::signal::ctrl_c().await.ok();
    info!("Shutting down...");
    pipeline.stop().await;

    info!("celltrace logger shut down gracefully");
    Ok(())
}
