//! Job template rendering
//!
//! Substitutes `{{ variable }}` placeholders in a JSON-compatible template
//! with caller-supplied bindings. A string that is exactly one placeholder
//! keeps the bound value's JSON type; a string mixing literal text and
//! placeholders concatenates string renderings. Placeholder paths are
//! dotted (`deployment.parameters.timeout`) and resolve through nested
//! objects.
//!
//! Rendering is a pure function of its inputs.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A placeholder's dotted path did not resolve in the bindings.
    #[error("missing template variable '{0}'")]
    MissingVariable(String),
}

/// What to do when a placeholder path has no binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnMissing {
    /// Fail with [`TemplateError::MissingVariable`] naming the path.
    #[default]
    Fail,

    /// Resolve a whole-string placeholder to `null` and an embedded one to
    /// the empty string. Used for fields declared lenient.
    Default,
}

/// Renders `template` against `bindings`, failing on any unresolved
/// placeholder.
pub fn render(template: &Value, bindings: &Map<String, Value>) -> Result<Value, TemplateError> {
    render_with(template, bindings, OnMissing::Fail)
}

/// Renders `template` against `bindings` with an explicit missing-variable
/// policy.
pub fn render_with(
    template: &Value,
    bindings: &Map<String, Value>,
    on_missing: OnMissing,
) -> Result<Value, TemplateError> {
    match template {
        Value::String(text) => render_string(text, bindings, on_missing),
        Value::Array(items) => items
            .iter()
            .map(|item| render_with(item, bindings, on_missing))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(fields) => {
            let mut rendered = Map::with_capacity(fields.len());
            for (key, value) in fields {
                rendered.insert(key.clone(), render_with(value, bindings, on_missing)?);
            }
            Ok(Value::Object(rendered))
        }
        literal => Ok(literal.clone()),
    }
}

/// Looks up a dotted path (`a.b.c`) through nested objects in `bindings`.
pub fn lookup_path<'a>(bindings: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = bindings.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_-]+)*)\s*\}\}")
            .expect("placeholder pattern compiles")
    })
}

fn render_string(
    text: &str,
    bindings: &Map<String, Value>,
    on_missing: OnMissing,
) -> Result<Value, TemplateError> {
    let pattern = placeholder_pattern();

    if !pattern.is_match(text) {
        return Ok(Value::String(text.to_string()));
    }

    // A string that is exactly one placeholder keeps the bound value's type.
    if let Some(captures) = pattern.captures(text) {
        let whole = captures.get(0).expect("match always has group 0");
        if whole.start() == 0 && whole.end() == text.len() {
            let path = &captures[1];
            return match lookup_path(bindings, path) {
                Some(value) => Ok(value.clone()),
                None => match on_missing {
                    OnMissing::Fail => Err(TemplateError::MissingVariable(path.to_string())),
                    OnMissing::Default => Ok(Value::Null),
                },
            };
        }
    }

    // Mixed literal text and placeholders: concatenate string renderings.
    let mut rendered = String::with_capacity(text.len());
    let mut last_end = 0;
    for captures in pattern.captures_iter(text) {
        let whole = captures.get(0).expect("match always has group 0");
        rendered.push_str(&text[last_end..whole.start()]);
        let path = &captures[1];
        match lookup_path(bindings, path) {
            Some(value) => rendered.push_str(&value_text(value)),
            None => match on_missing {
                OnMissing::Fail => {
                    return Err(TemplateError::MissingVariable(path.to_string()));
                }
                OnMissing::Default => {}
            },
        }
        last_end = whole.end();
    }
    rendered.push_str(&text[last_end..]);

    Ok(Value::String(rendered))
}

/// String form of a value embedded in literal text. Strings are inserted
/// verbatim, null renders as empty, everything else as compact JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings(value: Value) -> Map<String, Value> {
        value.as_object().expect("test bindings are an object").clone()
    }

    #[test]
    fn test_literals_pass_through() {
        let b = bindings(json!({}));
        let template = json!({"cpu": 2, "detach": false, "note": "no placeholders"});
        assert_eq!(render(&template, &b).unwrap(), template);
    }

    #[test]
    fn test_full_placeholder_substitutes_string() {
        let b = bindings(json!({"image": "worker:latest"}));
        let template = json!({"image": "{{ image }}", "cpu": 2});
        assert_eq!(
            render(&template, &b).unwrap(),
            json!({"image": "worker:latest", "cpu": 2})
        );
    }

    #[test]
    fn test_full_placeholder_preserves_json_type() {
        let b = bindings(json!({
            "cpu": 4,
            "detach": true,
            "mounts": ["/data", "/cache"],
            "resources": {"memory": "2Gi"}
        }));
        let template = json!({
            "cpu": "{{ cpu }}",
            "detach": "{{ detach }}",
            "mounts": "{{ mounts }}",
            "resources": "{{ resources }}"
        });
        assert_eq!(
            render(&template, &b).unwrap(),
            json!({
                "cpu": 4,
                "detach": true,
                "mounts": ["/data", "/cache"],
                "resources": {"memory": "2Gi"}
            })
        );
    }

    #[test]
    fn test_mixed_text_concatenates() {
        let b = bindings(json!({"name": "etl", "attempt": 3}));
        let template = json!("run-{{ name }}-{{ attempt }}");
        assert_eq!(render(&template, &b).unwrap(), json!("run-etl-3"));
    }

    #[test]
    fn test_dotted_path_lookup() {
        let b = bindings(json!({
            "deployment": {"parameters": {"timeout": 30}}
        }));
        let template = json!("{{ deployment.parameters.timeout }}");
        assert_eq!(render(&template, &b).unwrap(), json!(30));
    }

    #[test]
    fn test_missing_variable_names_the_path() {
        let b = bindings(json!({"image": "worker:latest"}));
        let template = json!({"timeout": "{{ timeout }}"});
        assert_eq!(
            render(&template, &b).unwrap_err(),
            TemplateError::MissingVariable("timeout".to_string())
        );

        let nested = json!("{{ deployment.parameters.timeout }}");
        assert_eq!(
            render(&nested, &b).unwrap_err(),
            TemplateError::MissingVariable("deployment.parameters.timeout".to_string())
        );
    }

    #[test]
    fn test_lenient_resolves_missing_to_null_or_empty() {
        let b = bindings(json!({}));
        assert_eq!(
            render_with(&json!("{{ gone }}"), &b, OnMissing::Default).unwrap(),
            Value::Null
        );
        assert_eq!(
            render_with(&json!("prefix-{{ gone }}"), &b, OnMissing::Default).unwrap(),
            json!("prefix-")
        );
    }

    #[test]
    fn test_renders_inside_arrays_and_nested_objects() {
        let b = bindings(json!({"tag": "v1", "replicas": 2}));
        let template = json!({
            "args": ["--tag", "{{ tag }}"],
            "spec": {"replicas": "{{ replicas }}"}
        });
        assert_eq!(
            render(&template, &b).unwrap(),
            json!({"args": ["--tag", "v1"], "spec": {"replicas": 2}})
        );
    }

    #[test]
    fn test_null_binding_is_a_present_value() {
        let b = bindings(json!({"maybe": null}));
        assert_eq!(render(&json!("{{ maybe }}"), &b).unwrap(), Value::Null);
    }
}
