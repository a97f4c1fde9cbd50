//! ABOUTME: The Patch tool: deep-merges structured data into an existing (or new) file
//! ABOUTME: preserving the target's format (spec.md §4.9)

use async_trait::async_trait;
use serde_json::Value;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::result::{StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

use crate::paths;
use crate::query::parse_structured;

/// Recursively merge `patch` into `base`, `patch` winning on scalar
/// conflicts; arrays are replaced wholesale rather than concatenated
/// (spec.md §4.9's "structural merge", not an append).
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

fn serialize(format: &str, value: &Value) -> Result<String> {
    match format {
        "json" => serde_json::to_string_pretty(value)
            .map_err(|e| HypergenError::tool("patch", ToolErrorKind::Patch, format!("failed to serialize JSON: {e}"))),
        "yaml" | "yml" => serde_yaml::to_string(value)
            .map_err(|e| HypergenError::tool("patch", ToolErrorKind::Patch, format!("failed to serialize YAML: {e}"))),
        "toml" => {
            let table = json_to_toml(value)?;
            toml::to_string_pretty(&table)
                .map_err(|e| HypergenError::tool("patch", ToolErrorKind::Patch, format!("failed to serialize TOML: {e}")))
        }
        other => Err(HypergenError::tool("patch", ToolErrorKind::Patch, format!("unsupported patch format '{other}'"))),
    }
}

fn json_to_toml(value: &Value) -> Result<toml::Value> {
    Ok(match value {
        Value::String(s) => toml::Value::String(s.clone()),
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                toml::Value::Integer(i)
            } else {
                toml::Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        Value::Array(arr) => toml::Value::Array(
            arr.iter()
                .map(json_to_toml)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Object(map) => {
            let mut table = toml::map::Map::new();
            for (k, v) in map {
                table.insert(k.clone(), json_to_toml(v)?);
            }
            toml::Value::Table(table)
        }
        Value::Null => {
            return Err(HypergenError::tool("patch", ToolErrorKind::Patch, "null values cannot be represented in TOML"))
        }
    })
}

pub struct PatchTool;

#[async_trait]
impl Tool for PatchTool {
    fn name(&self) -> &str {
        "patch"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::Patch(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["patch tool received a non-patch step".into()]));
        };
        let path = paths::resolve_in_sandbox(&step.project_root, &payload.file)?;
        if !path.is_file() && !payload.create_if_missing {
            return Ok(ValidationResult::invalid(vec![format!("patch target not found: {}", path.display())]));
        }
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::Patch(payload) = &step.step.kind else {
            return Err(HypergenError::validation("patch tool requires a patch step"));
        };
        let result = StepResult::pending(&step.step.name, "patch");

        let path = paths::resolve_in_sandbox(&step.project_root, &payload.file)?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let format = payload.format.clone().unwrap_or_else(|| extension.to_string());

        let (mut base, created) = if path.is_file() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| HypergenError::tool("patch", ToolErrorKind::Patch, format!("failed to read '{}': {e}", path.display())))?;
            (parse_structured(&content, Some(&format), extension)?, false)
        } else if payload.create_if_missing {
            (Value::Object(Default::default()), true)
        } else {
            return Err(HypergenError::tool("patch", ToolErrorKind::Patch, format!("patch target not found: {}", path.display())));
        };

        deep_merge(&mut base, &payload.merge);
        let serialized = serialize(&format, &base)?;

        if options.dry_run || step.dry_run {
            return Ok(StepResult {
                tool_result: Some(ToolResult::Patch { file: path.to_string_lossy().to_string(), created }),
                ..result.finish(StepStatus::Completed)
            });
        }

        hypergen_template::operations::add(&path, &serialized, true)
            .map_err(|e| HypergenError::tool("patch", ToolErrorKind::Patch, format!("failed to write '{}': {e}", path.display())))?;

        Ok(StepResult {
            files_created: if created { vec![path.to_string_lossy().to_string()] } else { vec![] },
            files_modified: if created { vec![] } else { vec![path.to_string_lossy().to_string()] },
            tool_result: Some(ToolResult::Patch { file: path.to_string_lossy().to_string(), created }),
            ..result.finish(StepStatus::Completed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_merge_overwrites_scalars_and_merges_nested_objects() {
        let mut base = serde_json::json!({"a": 1, "nested": {"x": 1, "y": 2}});
        let patch = serde_json::json!({"a": 2, "nested": {"y": 3, "z": 4}});
        deep_merge(&mut base, &patch);
        assert_eq!(base, serde_json::json!({"a": 2, "nested": {"x": 1, "y": 3, "z": 4}}));
    }

    #[test]
    fn deep_merge_replaces_arrays_wholesale() {
        let mut base = serde_json::json!({"list": [1, 2, 3]});
        let patch = serde_json::json!({"list": [9]});
        deep_merge(&mut base, &patch);
        assert_eq!(base, serde_json::json!({"list": [9]}));
    }
}
