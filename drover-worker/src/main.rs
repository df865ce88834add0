//! Drover Worker
//!
//! A long-running process that polls the scheduler for flow runs assigned
//! to a work pool and launches them through an execution backend.
//!
//! Architecture:
//! - Configuration: load settings from environment or defaults
//! - Registry: worker-type string -> execution backend factory
//! - Configuration rendering: work pool template + run variables -> job
//! - Poller: the poll & dispatch loop, bounded by the capacity limiter
//! - Status: lock-free last-poll tracking for health checks and heartbeats

mod backend;
mod config;
mod configuration;
mod limiter;
mod poller;
mod registry;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::WorkerConfig;
use crate::poller::FlowRunPoller;
use drover_client::SchedulerClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drover_worker=info,drover_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting drover worker");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: worker={}, pool={}, scheduler={}",
        config.name, config.work_pool_name, config.api_url
    );

    // Populate the worker type registry and pick this worker's backend.
    // An unknown type is a fatal startup error, not something to limp past.
    registry::register_defaults();
    let backend = registry::create(&config.worker_type).with_context(|| {
        format!(
            "unknown worker type '{}' (available: {})",
            config.worker_type,
            registry::available_types().join(", ")
        )
    })?;

    info!("Using worker type '{}'", backend.kind());

    // Initialize scheduler client
    let client = Arc::new(SchedulerClient::new(config.api_url.clone()));

    // Wire shutdown to Ctrl-C
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    // Create and run the poller
    let poller = FlowRunPoller::new(config, client, backend, shutdown);

    info!("Worker initialized: {:?}", poller.status());

    if let Err(e) = poller.run().await {
        error!("Poller error: {}", e);
        return Err(e);
    }

    info!("Worker stopped");
    Ok(())
}

/// Loads and validates configuration from environment variables.
fn load_config() -> Result<WorkerConfig> {
    let config = WorkerConfig::from_env()?;
    config.validate()?;
    Ok(config)
}
