//! Job configuration
//!
//! Turns a work pool's job template plus per-run variable bindings into the
//! validated bag of fields an execution backend needs to launch one job.
//!
//! The lifecycle is fixed: render against the worker type's declared field
//! schema, validate (collecting every violation, not just the first), then
//! `finalize` exactly once with the run's identity just before launch.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use drover_core::domain::deployment::{Deployment, Flow};
use drover_core::domain::flow_run::FlowRun;
use drover_core::domain::work_pool::WorkPool;
use drover_core::template::{self, OnMissing, TemplateError};

/// Command prefix that hands process supervision to the external runner.
///
/// A configuration whose command invokes this entrypoint is not supervised
/// by the worker: the runner reports the run's state itself, so a bad exit
/// code is not the worker's story to tell.
pub const RUNNER_ENTRYPOINT: &str = "drover flow-run execute";

/// JSON type a schema field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Object,
    Array,
    Any,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
            FieldKind::Any => true,
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Bool => "bool",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
            FieldKind::Any => "any",
        }
    }
}

/// How missing template variables behave for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A missing variable fails the render.
    Strict,
    /// A missing variable resolves to null and the field is omitted.
    Lenient,
}

/// One field of a worker type's configuration schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub resolution: Resolution,
}

impl FieldSpec {
    /// A required field with strict placeholder resolution.
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            resolution: Resolution::Strict,
        }
    }

    /// An optional field with lenient placeholder resolution.
    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            resolution: Resolution::Lenient,
        }
    }

    pub fn lenient(mut self) -> Self {
        self.resolution = Resolution::Lenient;
        self
    }
}

/// Hand-declared field schema for one worker type.
///
/// Every field a backend understands is listed here; rendering gives any
/// field without an explicit template entry the implicit default template
/// `{{ fieldName }}`.
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    fields: Vec<FieldSpec>,
}

impl ConfigSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|spec| spec.name == name)
    }
}

/// A single schema violation found while validating a rendered
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub problem: String,
}

/// Every violation found in one validation pass, so a template author can
/// fix them all in one round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub violations: Vec<FieldViolation>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for violation in &self.violations {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", violation.field, violation.problem)?;
            first = false;
        }
        Ok(())
    }
}

/// Errors producing or finalizing a job configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A strict field's placeholder did not resolve.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The rendered configuration does not match the worker type's schema.
    #[error("job configuration failed validation: {0}")]
    Validation(ValidationFailure),

    /// `finalize` was called a second time. Programming error, reported
    /// rather than silently ignored.
    #[error("job configuration was already finalized")]
    AlreadyFinalized,
}

/// The rendered, validated inputs for launching one job.
///
/// Produced only by [`JobConfiguration::from_template`]; mutated exactly
/// once by [`JobConfiguration::finalize`]; owned by the dispatch attempt
/// that created it.
///
/// The typed accessors (`command`, `env`, `labels`, `name`) are the
/// authoritative view after finalize; `values` keeps the raw rendered
/// fields for backend-specific keys.
#[derive(Debug, Clone)]
pub struct JobConfiguration {
    values: Map<String, Value>,
    command: Option<String>,
    env: BTreeMap<String, String>,
    labels: BTreeMap<String, String>,
    name: Option<String>,
    finalized: bool,
}

impl JobConfiguration {
    /// Renders `template` against `bindings` and validates the result
    /// against `schema`.
    ///
    /// Schema fields absent from the template render from the implicit
    /// default template `{{ fieldName }}`. Validation collects every
    /// violating field before failing.
    pub fn from_template(
        schema: &ConfigSchema,
        template: &Map<String, Value>,
        bindings: &Map<String, Value>,
    ) -> Result<Self, ConfigurationError> {
        let mut violations = Vec::new();
        let mut values = Map::new();

        for spec in schema.fields() {
            let entry = template
                .get(spec.name)
                .cloned()
                .unwrap_or_else(|| Value::String(format!("{{{{ {} }}}}", spec.name)));
            let on_missing = match spec.resolution {
                Resolution::Strict => OnMissing::Fail,
                Resolution::Lenient => OnMissing::Default,
            };

            let rendered = template::render_with(&entry, bindings, on_missing)?;

            if rendered.is_null() {
                if spec.required {
                    violations.push(FieldViolation {
                        field: spec.name.to_string(),
                        problem: "required field is missing".to_string(),
                    });
                }
                continue;
            }

            if !spec.kind.accepts(&rendered) {
                violations.push(FieldViolation {
                    field: spec.name.to_string(),
                    problem: format!(
                        "expected {}, got {}",
                        spec.kind.name(),
                        json_type_name(&rendered)
                    ),
                });
                continue;
            }

            values.insert(spec.name.to_string(), rendered);
        }

        for key in template.keys() {
            if !schema.has_field(key) {
                violations.push(FieldViolation {
                    field: key.clone(),
                    problem: "unknown field for this worker type".to_string(),
                });
            }
        }

        if !violations.is_empty() {
            return Err(ConfigurationError::Validation(ValidationFailure {
                violations,
            }));
        }

        let command = values
            .get("command")
            .and_then(Value::as_str)
            .map(str::to_string);
        let name = values
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);
        let env = string_map(values.get("env"));
        let labels = string_map(values.get("labels"));

        Ok(Self {
            values,
            command,
            env,
            labels,
            name,
            finalized: false,
        })
    }

    /// Command line to launch, if any. Defaults to the runner entrypoint at
    /// finalize.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Identity labels for backends that can attach metadata to jobs.
    #[allow(dead_code)]
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Display name for the launched job. Generated at finalize when the
    /// template did not set one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Raw rendered field value, for backend-specific keys.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// True when the command hands supervision to the external runner
    /// rather than this worker. Changes how launch failures are
    /// interpreted: the runner reports its own run state.
    pub fn delegates_to_runner(&self) -> bool {
        self.command
            .as_deref()
            .is_some_and(|command| command.contains(RUNNER_ENTRYPOINT))
    }

    /// Injects run-specific identity not expressible through templating:
    /// labels, a generated name, environment entries, and the default
    /// command.
    ///
    /// Called exactly once, after validation, before the configuration is
    /// handed to the execution backend. A second call is an error. Never
    /// fails for well-formed inputs.
    pub fn finalize(
        &mut self,
        flow_run: &FlowRun,
        deployment: Option<&Deployment>,
        flow: Option<&Flow>,
        work_pool: Option<&WorkPool>,
        worker_name: Option<&str>,
    ) -> Result<(), ConfigurationError> {
        if self.finalized {
            return Err(ConfigurationError::AlreadyFinalized);
        }

        // identity labels overwrite template labels of the same name
        self.labels
            .insert("drover.io/flow-run-id".to_string(), flow_run.id.to_string());
        self.labels
            .insert("drover.io/flow-run-name".to_string(), flow_run.name.clone());
        if let Some(deployment) = deployment {
            self.labels.insert(
                "drover.io/deployment-id".to_string(),
                deployment.id.to_string(),
            );
            self.labels.insert(
                "drover.io/deployment-name".to_string(),
                deployment.name.clone(),
            );
        }
        if let Some(flow) = flow {
            self.labels
                .insert("drover.io/flow-name".to_string(), flow.name.clone());
        }
        if let Some(work_pool) = work_pool {
            self.labels.insert(
                "drover.io/work-pool-name".to_string(),
                work_pool.name.clone(),
            );
        }
        if let Some(worker_name) = worker_name {
            self.labels
                .insert("drover.io/worker-name".to_string(), worker_name.to_string());
        }

        if self.name.is_none() {
            let id = flow_run.id.simple().to_string();
            self.name = Some(format!("{}-{}", flow_run.name, &id[..8]));
        }

        if self.command.is_none() {
            self.command = Some(RUNNER_ENTRYPOINT.to_string());
        }

        // identity env yields to env set explicitly in the template
        let mut identity_env = vec![
            ("DROVER__FLOW_RUN_ID".to_string(), flow_run.id.to_string()),
            ("DROVER__FLOW_RUN_NAME".to_string(), flow_run.name.clone()),
        ];
        if let Some(deployment) = deployment {
            identity_env.push((
                "DROVER__DEPLOYMENT_ID".to_string(),
                deployment.id.to_string(),
            ));
        }
        for (key, value) in identity_env {
            self.env.entry(key).or_insert(value);
        }

        self.finalized = true;
        Ok(())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Flattens an object of scalars into string pairs; null entries are
/// skipped, non-string scalars keep their JSON text.
fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(Value::Object(entries)) = value {
        for (key, entry) in entries {
            match entry {
                Value::Null => {}
                Value::String(text) => {
                    out.insert(key.clone(), text.clone());
                }
                other => {
                    out.insert(key.clone(), other.to_string());
                }
            }
        }
    }
    out
}
