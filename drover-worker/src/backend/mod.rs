//! Execution backends
//!
//! The worker never runs a job itself: it renders a configuration and hands
//! it to an [`ExecutionBackend`], the narrow seam behind which process
//! launch, container launch, etc. live.

mod process;

pub use process::ProcessBackend;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::configuration::{ConfigSchema, JobConfiguration};

/// Errors starting or monitoring one job. Always scoped to a single run.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to start job: {0}")]
    Spawn(std::io::Error),

    #[error("failed while monitoring job: {0}")]
    Monitor(String),

    #[error("job configuration is not launchable: {0}")]
    InvalidConfiguration(String),
}

/// How one job finished. Backend-specific exit codes are carried but never
/// interpreted beyond success/failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitResult {
    pub success: bool,
    pub exit_code: Option<i32>,
}

/// A launched job being monitored in the background.
#[derive(Debug)]
pub struct LaunchHandle {
    identifier: String,
    monitor: JoinHandle<Result<ExitResult, LaunchError>>,
}

impl LaunchHandle {
    pub fn new(identifier: String, monitor: JoinHandle<Result<ExitResult, LaunchError>>) -> Self {
        Self {
            identifier,
            monitor,
        }
    }

    /// Backend-assigned identifier for the running job (e.g. a pid).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Waits for the job to finish.
    pub async fn wait(self) -> Result<ExitResult, LaunchError> {
        match self.monitor.await {
            Ok(result) => result,
            Err(e) => Err(LaunchError::Monitor(e.to_string())),
        }
    }
}

/// Capability set one worker type provides: its configuration schema plus
/// submit/monitor for finalized configurations.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Worker type string this backend registers under.
    fn kind(&self) -> &'static str;

    /// The declared field schema rendered configurations are validated
    /// against.
    fn config_schema(&self) -> ConfigSchema;

    /// Launches a job from a finalized configuration.
    async fn submit(&self, config: &JobConfiguration) -> Result<LaunchHandle, LaunchError>;

    /// Waits for a launched job to finish.
    async fn await_completion(&self, handle: LaunchHandle) -> Result<ExitResult, LaunchError> {
        handle.wait().await
    }
}
