//! Scenario document loading.
//!
//! A scenario file holds either one scenario object or an array of them.
//! Each document is validated against [`SCENARIO_SCHEMA`] before it is
//! deserialized, so a malformed document reports every structural defect
//! instead of the first serde error.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use claimsim_contracts::{
    error::{SimError, SimResult},
    report::ValidationIssue,
    scenario::ScenarioDefinition,
};

/// The bundled JSON Schema for scenario documents.
pub const SCENARIO_SCHEMA: &str = include_str!("../schema/scenario.schema.json");

/// Parse the bundled schema.
pub fn scenario_schema() -> SimResult<Value> {
    serde_json::from_str(SCENARIO_SCHEMA).map_err(|e| SimError::ConfigError {
        reason: format!("bundled scenario schema is not valid JSON: {e}"),
    })
}

/// Validate `doc` against `schema`, one `json-schema` error per violation.
pub fn structural_issues(schema: &Value, doc: &Value) -> Vec<ValidationIssue> {
    match jsonschema::validator_for(schema) {
        Ok(validator) => validator
            .iter_errors(doc)
            .map(|error| {
                let path = pointer_to_path(&error.instance_path.to_string());
                ValidationIssue::error("json-schema", path, error.to_string())
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "scenario schema failed to compile");
            vec![ValidationIssue::error(
                "json-schema",
                "",
                format!("invalid JSON Schema document: {e}"),
            )]
        }
    }
}

/// Convert a JSON pointer (`/patterns/0/id`) into the dotted form used in
/// validation reports (`patterns[0].id`).
pub fn pointer_to_path(pointer: &str) -> String {
    let mut path = String::new();
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if segment.chars().all(|c| c.is_ascii_digit()) {
            path.push_str(&format!("[{segment}]"));
        } else {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(&segment);
        }
    }
    path
}

/// Load every scenario in `text`, which may be a single object or an array.
///
/// Documents that violate the schema fail with `SimError::ScenarioInvalid`
/// carrying all of their structural issues. Text that is not JSON, or is
/// neither an object nor an array, fails with `SimError::SchemaValidation`.
pub fn load_scenarios_str(text: &str) -> SimResult<Vec<ScenarioDefinition>> {
    let root: Value = serde_json::from_str(text).map_err(|e| SimError::SchemaValidation {
        reason: format!("scenario document is not valid JSON: {e}"),
    })?;
    let docs = match root {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(SimError::SchemaValidation {
                reason: format!(
                    "expected a scenario object or an array of scenarios, found {}",
                    json_kind(&other)
                ),
            })
        }
    };

    let schema = scenario_schema()?;
    docs.into_iter()
        .enumerate()
        .map(|(index, doc)| load_one(&schema, index, doc))
        .collect()
}

/// Load exactly one scenario from `text`.
pub fn load_scenario_str(text: &str) -> SimResult<ScenarioDefinition> {
    let mut scenarios = load_scenarios_str(text)?;
    if scenarios.len() != 1 {
        return Err(SimError::SchemaValidation {
            reason: format!("expected exactly one scenario, found {}", scenarios.len()),
        });
    }
    Ok(scenarios.remove(0))
}

/// Read and load a scenario file.
pub fn load_scenarios_file(path: impl AsRef<Path>) -> SimResult<Vec<ScenarioDefinition>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| SimError::ConfigError {
        reason: format!("cannot read scenario file '{}': {e}", path.display()),
    })?;
    debug!(path = %path.display(), "loading scenario file");
    load_scenarios_str(&text)
}

fn load_one(schema: &Value, index: usize, doc: Value) -> SimResult<ScenarioDefinition> {
    let scenario_id = doc
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{index}"));

    let issues = structural_issues(schema, &doc);
    if !issues.is_empty() {
        warn!(%scenario_id, issues = issues.len(), "scenario document failed schema validation");
        return Err(SimError::ScenarioInvalid { scenario_id, issues });
    }

    serde_json::from_value(doc).map_err(|e| SimError::SchemaValidation {
        reason: format!("scenario '{scenario_id}': {e}"),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
