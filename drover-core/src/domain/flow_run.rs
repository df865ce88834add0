//! Flow run domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One schedulable unit of work, created from a deployment, to be executed
/// once.
///
/// Served by the scheduler when the worker polls its work pool. Read-only to
/// the worker: its parameters and job variables feed template rendering, its
/// identity feeds the finalize step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRun {
    pub id: Uuid,
    pub name: String,
    pub flow_id: Uuid,
    #[serde(default)]
    pub deployment_id: Option<Uuid>,
    #[serde(default)]
    pub work_queue_name: Option<String>,
    /// Parameters passed to the flow itself. Opaque to the worker.
    #[serde(default)]
    pub parameters: std::collections::HashMap<String, Value>,
    /// Per-run overrides for the work pool's template variables.
    #[serde(default)]
    pub job_variables: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}
