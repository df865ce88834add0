//! Work pool domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named grouping of workers and the default job template they share.
///
/// Cached by the worker and refreshed once per poll cycle; a refresh failure
/// keeps the previous copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkPool {
    pub name: String,
    /// Worker type that serves this pool (e.g. "process").
    #[serde(rename = "type")]
    pub pool_type: String,
    #[serde(default)]
    pub base_job_template: JobTemplate,
}

/// Declarative mapping from job configuration field to template expression,
/// plus the default value for each template variable.
///
/// Constructed once on the scheduler side; immutable here. Bindings for one
/// run are `variable_defaults` layered under the deployment's and then the
/// run's own `job_variables`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobTemplate {
    /// Field name -> literal value or string with `{{ variable }}`
    /// placeholders.
    #[serde(default)]
    pub job_configuration: Map<String, Value>,
    #[serde(default)]
    pub variable_defaults: Map<String, Value>,
}
