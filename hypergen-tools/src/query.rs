//! ABOUTME: The Query tool: parses a structured file and evaluates dot-path checks
//! ABOUTME: or a full condition-sandbox expression against it, exporting the result (spec.md §4.9)

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::result::{StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};
use hypergen_core::variables::Variables;

use crate::paths;

/// Parse `content` according to `format` (or inferred from `extension`).
pub fn parse_structured(content: &str, format: Option<&str>, extension: &str) -> Result<Value> {
    let fmt = format.unwrap_or(extension);
    match fmt {
        "json" => serde_json::from_str(content)
            .map_err(|e| HypergenError::tool("query", ToolErrorKind::Query, format!("invalid JSON: {e}"))),
        "yaml" | "yml" => serde_yaml::from_str(content)
            .map_err(|e| HypergenError::tool("query", ToolErrorKind::Query, format!("invalid YAML: {e}"))),
        "toml" => {
            let table: toml::Value = toml::from_str(content)
                .map_err(|e| HypergenError::tool("query", ToolErrorKind::Query, format!("invalid TOML: {e}")))?;
            Ok(toml_to_json(&table))
        }
        "env" => Ok(parse_env(content)),
        other => Err(HypergenError::tool("query", ToolErrorKind::Query, format!("unsupported query format '{other}'"))),
    }
}

fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::Number((*i).into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            Value::Object(table.iter().map(|(k, v)| (k.clone(), toml_to_json(v))).collect())
        }
    }
}

fn parse_env(content: &str) -> Value {
    let mut map = serde_json::Map::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            map.insert(key.trim().to_string(), Value::String(value.to_string()));
        }
    }
    Value::Object(map)
}

/// Resolve a dot-path (`a.b.0.c`) against a JSON value.
pub fn dot_path(value: &Value, path: &str) -> Option<Value> {
    let mut current = value.clone();
    for segment in path.split('.') {
        current = match &current {
            Value::Object(map) => map.get(segment)?.clone(),
            Value::Array(arr) => {
                let idx: usize = segment.parse().ok()?;
                arr.get(idx)?.clone()
            }
            _ => return None,
        };
    }
    Some(current)
}

/// One `checks[]` entry: `path` alone asserts truthiness/presence;
/// `path == value` / `path != value` compares.
fn eval_check(data: &Value, check: &str) -> bool {
    let check = check.trim();
    for op in ["==", "!="] {
        if let Some(idx) = check.find(op) {
            let (path, rhs) = check.split_at(idx);
            let rhs = rhs[op.len()..].trim().trim_matches('"').trim_matches('\'');
            let path = path.trim();
            let lhs = dot_path(data, path);
            let matches = match &lhs {
                Some(Value::String(s)) => s == rhs,
                Some(other) => other.to_string().trim_matches('"') == rhs,
                None => false,
            };
            return if op == "==" { matches } else { !matches };
        }
    }
    match dot_path(data, check) {
        Some(v) => hypergen_core::condition::truthy(&v),
        None => false,
    }
}

pub struct QueryTool;

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        "query"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::Query(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["query tool received a non-query step".into()]));
        };
        let path = paths::resolve_in_sandbox(&step.project_root, &payload.file)?;
        if !path.is_file() {
            return Ok(ValidationResult::invalid(vec![format!("query file not found: {}", path.display())]));
        }
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, _options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::Query(payload) = &step.step.kind else {
            return Err(HypergenError::validation("query tool requires a query step"));
        };
        let result = StepResult::pending(&step.step.name, "query");

        let path = paths::resolve_in_sandbox(&step.project_root, &payload.file)?;
        let content = std::fs::read_to_string(&path)
            .map_err(|e| HypergenError::tool("query", ToolErrorKind::Query, format!("failed to read '{}': {e}", path.display())))?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let data = parse_structured(&content, payload.format.as_deref(), extension)?;

        let checks_passed = if let Some(expr) = &payload.expression {
            let mut vars = step.variables.clone();
            merge_data_into_variables(&mut vars, &data);
            hypergen_core::eval_when(expr, &vars, step.condition_helpers.as_ref())
        } else {
            payload.checks.iter().all(|check| eval_check(&data, check))
        };

        let mut exported = HashMap::new();
        for (name, path_expr) in &step.step.exports {
            if let Some(value) = dot_path(&data, path_expr) {
                exported.insert(name.clone(), value);
            }
        }

        let status = if checks_passed || step.step.continue_on_error {
            StepStatus::Completed
        } else {
            return Err(HypergenError::tool("query", ToolErrorKind::Query, "query checks failed"));
        };

        let mut metadata = HashMap::new();
        if !exported.is_empty() {
            metadata.insert("exports".to_string(), Value::Object(exported.clone().into_iter().collect()));
        }

        Ok(StepResult {
            error: if checks_passed { None } else { Some("query checks failed".into()) },
            tool_result: Some(ToolResult::Query { checks_passed, exported: exported.clone() }),
            output: Some(Value::Object(exported.into_iter().collect())),
            metadata,
            ..result.finish(status)
        })
    }
}

fn merge_data_into_variables(vars: &mut Variables, data: &Value) {
    if let Value::Object(map) = data {
        for (k, v) in map {
            vars.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_path_walks_nested_objects_and_arrays() {
        let value = serde_json::json!({"a": {"b": [1, 2, {"c": "found"}]}});
        assert_eq!(dot_path(&value, "a.b.2.c"), Some(Value::String("found".into())));
    }

    #[test]
    fn eval_check_supports_equality() {
        let value = serde_json::json!({"name": "hypergen"});
        assert!(eval_check(&value, "name == hypergen"));
        assert!(!eval_check(&value, "name != hypergen"));
    }

    #[test]
    fn parse_env_splits_key_value_lines() {
        let parsed = parse_env("FOO=bar\n# comment\nBAZ=\"qux\"\n");
        assert_eq!(parsed["FOO"], "bar");
        assert_eq!(parsed["BAZ"], "qux");
    }
}
