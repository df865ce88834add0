//! Process execution backend
//!
//! Launches jobs as local child processes and monitors them to exit. The
//! default worker type.

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::backend::{ExecutionBackend, ExitResult, LaunchError, LaunchHandle};
use crate::configuration::{ConfigSchema, FieldKind, FieldSpec, JobConfiguration};

/// Runs each job as a child process of the worker.
pub struct ProcessBackend;

impl ProcessBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    fn kind(&self) -> &'static str {
        "process"
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::new(vec![
            FieldSpec::optional("command", FieldKind::String),
            FieldSpec::optional("env", FieldKind::Object),
            FieldSpec::optional("labels", FieldKind::Object),
            FieldSpec::optional("name", FieldKind::String),
            FieldSpec::optional("working_dir", FieldKind::String),
        ])
    }

    async fn submit(&self, config: &JobConfiguration) -> Result<LaunchHandle, LaunchError> {
        let command_line = config
            .command()
            .ok_or_else(|| LaunchError::InvalidConfiguration("no command to run".to_string()))?;

        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| LaunchError::InvalidConfiguration("empty command".to_string()))?;

        let mut command = Command::new(program);
        command.args(parts).envs(config.env());
        if let Some(dir) = config.get("working_dir").and_then(Value::as_str) {
            command.current_dir(dir);
        }
        // an abandoned dispatch must not leak its child
        command.kill_on_drop(true);

        let mut child = command.spawn().map_err(LaunchError::Spawn)?;
        let identifier = child
            .id()
            .map(|pid| pid.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        debug!(job = %identifier, name = ?config.name(), "spawned job process");

        let monitor = tokio::spawn(async move {
            let status = child
                .wait()
                .await
                .map_err(|e| LaunchError::Monitor(e.to_string()))?;
            Ok(ExitResult {
                success: status.success(),
                exit_code: status.code(),
            })
        });

        Ok(LaunchHandle::new(identifier, monitor))
    }
}
