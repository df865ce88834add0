//! Worker configuration
//!
//! Defines all configurable parameters for the worker including polling
//! cadence, concurrency limits, and scheduler connection settings.

use std::time::Duration;

/// Worker configuration
///
/// All intervals are configurable to allow tuning for different deployment
/// scenarios (dev vs prod, fast vs slow schedulers).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name of this worker instance, reported in heartbeats and job labels
    pub name: String,

    /// Scheduler base URL (e.g., "http://localhost:4200")
    pub api_url: String,

    /// Work pool this worker polls
    pub work_pool_name: String,

    /// Queues to poll within the pool. Empty means every queue.
    pub work_queue_names: Vec<String>,

    /// Worker type to launch jobs with (must be registered)
    pub worker_type: String,

    /// How often to poll the scheduler for scheduled flow runs
    pub poll_interval: Duration,

    /// How far ahead of their scheduled start to pick up runs
    pub prefetch: Duration,

    /// How often to send worker heartbeats
    pub heartbeat_interval: Duration,

    /// Max flow runs launched/monitored concurrently. `None` is unbounded.
    pub concurrency_limit: Option<usize>,

    /// How long in-flight dispatches may drain after a shutdown signal
    pub shutdown_grace: Duration,
}

impl WorkerConfig {
    /// Creates a new configuration with defaults
    pub fn new(name: String, api_url: String, work_pool_name: String) -> Self {
        Self {
            name,
            api_url,
            work_pool_name,
            work_queue_names: Vec::new(),
            worker_type: "process".to_string(),
            poll_interval: Duration::from_secs(10),
            prefetch: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            concurrency_limit: None,
            shutdown_grace: Duration::from_secs(30),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DROVER_WORK_POOL (required)
    /// - DROVER_API_URL (optional, default: http://localhost:4200)
    /// - DROVER_WORKER_NAME (optional, default: generated)
    /// - DROVER_WORK_QUEUES (optional, comma-separated, default: all queues)
    /// - DROVER_WORKER_TYPE (optional, default: process)
    /// - DROVER_POLL_INTERVAL (optional, seconds, default: 10)
    /// - DROVER_PREFETCH_SECONDS (optional, default: 10)
    /// - DROVER_HEARTBEAT_INTERVAL (optional, seconds, default: 30)
    /// - DROVER_CONCURRENCY_LIMIT (optional, default: unbounded)
    /// - DROVER_SHUTDOWN_GRACE (optional, seconds, default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        let work_pool_name = std::env::var("DROVER_WORK_POOL")
            .map_err(|_| anyhow::anyhow!("DROVER_WORK_POOL environment variable not set"))?;

        let api_url = std::env::var("DROVER_API_URL")
            .unwrap_or_else(|_| "http://localhost:4200".to_string());

        let name = std::env::var("DROVER_WORKER_NAME")
            .unwrap_or_else(|_| format!("worker-{}", uuid::Uuid::new_v4()));

        let work_queue_names = std::env::var("DROVER_WORK_QUEUES")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let worker_type =
            std::env::var("DROVER_WORKER_TYPE").unwrap_or_else(|_| "process".to_string());

        let poll_interval = std::env::var("DROVER_POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let prefetch = std::env::var("DROVER_PREFETCH_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let heartbeat_interval = std::env::var("DROVER_HEARTBEAT_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let concurrency_limit = std::env::var("DROVER_CONCURRENCY_LIMIT")
            .ok()
            .and_then(|s| s.parse::<usize>().ok());

        let shutdown_grace = std::env::var("DROVER_SHUTDOWN_GRACE")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            name,
            api_url,
            work_pool_name,
            work_queue_names,
            worker_type,
            poll_interval,
            prefetch,
            heartbeat_interval,
            concurrency_limit,
            shutdown_grace,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("worker name cannot be empty");
        }

        if self.work_pool_name.is_empty() {
            anyhow::bail!("work pool name cannot be empty");
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("api_url must start with http:// or https://");
        }

        if self.poll_interval.as_secs() == 0 {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.heartbeat_interval.as_secs() == 0 {
            anyhow::bail!("heartbeat_interval must be greater than 0");
        }

        if self.concurrency_limit == Some(0) {
            anyhow::bail!("concurrency_limit must be greater than 0 when set");
        }

        if self.shutdown_grace.as_secs() == 0 {
            anyhow::bail!("shutdown_grace must be greater than 0");
        }

        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new(
            format!("worker-{}", uuid::Uuid::new_v4()),
            "http://localhost:4200".to_string(),
            "default-pool".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.worker_type, "process");
        assert_eq!(config.concurrency_limit, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = WorkerConfig::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Empty pool name should fail
        config.work_pool_name = String::new();
        assert!(config.validate().is_err());

        config.work_pool_name = "default-pool".to_string();

        // Invalid URL should fail
        config.api_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config.api_url = "http://localhost:4200".to_string();
        assert!(config.validate().is_ok());

        // A zero concurrency limit would block every dispatch forever
        config.concurrency_limit = Some(0);
        assert!(config.validate().is_err());

        config.concurrency_limit = Some(4);
        assert!(config.validate().is_ok());
    }
}
