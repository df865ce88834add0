//! Worker DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Periodic liveness report sent to the scheduler.
///
/// `last_polled` is the start of the most recent poll attempt, not the end
/// of the most recent dispatch; a worker busy dispatching is still alive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    pub name: String,
    pub work_pool_name: String,
    #[serde(default)]
    pub queue_names: Vec<String>,
    #[serde(default)]
    pub last_polled: Option<DateTime<Utc>>,
}
