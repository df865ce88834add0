//! Flow run DTOs
//!
//! Bodies for polling scheduled runs and reporting their outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Filter sent when polling a work pool for scheduled flow runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduledRunsFilter {
    /// Restrict to these queues. Empty means every queue in the pool.
    #[serde(default)]
    pub work_queue_names: Vec<String>,

    /// Include runs scheduled to start before this instant (the prefetch
    /// window, so jobs with slow startup can be launched early).
    #[serde(default)]
    pub scheduled_before: Option<DateTime<Utc>>,
}

/// Terminal outcome the worker reports for a run it could not see through
/// to a healthy hand-off.
///
/// Successful completion is not reported here: the launched job owns its
/// own state once it is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The worker could not render, validate, or launch the job.
    Failed { message: String },

    /// The job was launched under this worker's supervision and exited
    /// without reporting its own state.
    Crashed { message: String },

    /// The dispatch was abandoned during worker shutdown.
    Cancelled { message: String },
}

impl RunOutcome {
    pub fn message(&self) -> &str {
        match self {
            RunOutcome::Failed { message }
            | RunOutcome::Crashed { message }
            | RunOutcome::Cancelled { message } => message,
        }
    }
}
