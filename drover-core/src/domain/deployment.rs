//! Deployment and flow domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A deployment: the template a flow run was created from.
///
/// The worker reads it for its job variable overrides and its name (which
/// ends up in the launched job's identity labels).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub name: String,
    /// Deployment-level overrides for the work pool's template variables.
    /// Sit between the pool's variable defaults and the run's own overrides.
    #[serde(default)]
    pub job_variables: Map<String, Value>,
}

/// The flow definition a run executes. Only its identity matters here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub id: Uuid,
    pub name: String,
}
