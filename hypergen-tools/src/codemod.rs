//! ABOUTME: The CodeMod tool: named textual transforms over existing files
//! ABOUTME: (add-import, add-export, add-property, replace-text, add-function, custom; spec.md §4.4)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::result::{StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

use crate::paths;

/// A single named transform: given the current file content and the
/// step's parameters, returns the new content (or `None` if no change was
/// necessary — an idempotent no-op).
pub type TransformFn = Arc<dyn Fn(&str, &HashMap<String, Value>) -> Result<Option<String>> + Send + Sync>;

fn param_str<'a>(params: &'a HashMap<String, Value>, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| HypergenError::validation(format!("codemod parameter '{key}' must be a string")))
}

fn add_import(content: &str, params: &HashMap<String, Value>) -> Result<Option<String>> {
    let import_line = param_str(params, "import")?;
    if content.lines().any(|l| l.trim() == import_line.trim()) {
        return Ok(None);
    }
    let mut lines: Vec<&str> = content.lines().collect();
    let insert_at = lines
        .iter()
        .rposition(|l| l.trim_start().starts_with("import ") || l.trim_start().starts_with("use "))
        .map(|i| i + 1)
        .unwrap_or(0);
    lines.insert(insert_at, import_line);
    Ok(Some(format!("{}\n", lines.join("\n"))))
}

fn add_export(content: &str, params: &HashMap<String, Value>) -> Result<Option<String>> {
    let export_line = param_str(params, "export")?;
    if content.lines().any(|l| l.trim() == export_line.trim()) {
        return Ok(None);
    }
    let mut out = content.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(export_line);
    out.push('\n');
    Ok(Some(out))
}

fn add_property(content: &str, params: &HashMap<String, Value>) -> Result<Option<String>> {
    let marker = param_str(params, "afterMarker")?;
    let property = param_str(params, "property")?;
    if content.contains(property.trim()) {
        return Ok(None);
    }
    let Some(pos) = content.find(marker) else {
        return Err(HypergenError::tool(
            "codemod",
            ToolErrorKind::CodeMod,
            format!("add-property marker '{marker}' not found"),
        ));
    };
    let insertion_point = pos + marker.len();
    let mut out = content.to_string();
    out.insert_str(insertion_point, property);
    Ok(Some(out))
}

fn replace_text(content: &str, params: &HashMap<String, Value>) -> Result<Option<String>> {
    let find = param_str(params, "find")?;
    let replace = param_str(params, "replace")?;
    let use_regex = params.get("regex").and_then(Value::as_bool).unwrap_or(false);

    let replaced = if use_regex {
        let re = regex::Regex::new(find)
            .map_err(|e| HypergenError::tool("codemod", ToolErrorKind::CodeMod, format!("invalid regex: {e}")))?;
        re.replace_all(content, replace).to_string()
    } else {
        content.replace(find, replace)
    };

    if replaced == content {
        Ok(None)
    } else {
        Ok(Some(replaced))
    }
}

fn add_function(content: &str, params: &HashMap<String, Value>) -> Result<Option<String>> {
    let function_body = param_str(params, "function")?;
    let name_hint = params.get("name").and_then(Value::as_str);
    if let Some(name) = name_hint {
        if content.contains(name) {
            return Ok(None);
        }
    } else if content.contains(function_body.trim()) {
        return Ok(None);
    }
    let mut out = content.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(function_body);
    out.push('\n');
    Ok(Some(out))
}

pub fn default_transforms() -> HashMap<String, TransformFn> {
    let mut map: HashMap<String, TransformFn> = HashMap::new();
    map.insert("add-import".into(), Arc::new(add_import));
    map.insert("add-export".into(), Arc::new(add_export));
    map.insert("add-property".into(), Arc::new(add_property));
    map.insert("replace-text".into(), Arc::new(replace_text));
    map.insert("add-function".into(), Arc::new(add_function));
    map
}

pub struct CodeModTool {
    transforms: HashMap<String, TransformFn>,
}

impl CodeModTool {
    pub fn new() -> Self {
        Self {
            transforms: default_transforms(),
        }
    }

    pub fn with_custom_transform(mut self, name: impl Into<String>, transform: TransformFn) -> Self {
        self.transforms.insert(name.into(), transform);
        self
    }
}

impl Default for CodeModTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CodeModTool {
    fn name(&self) -> &str {
        "codemod"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::CodeMod(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["codemod tool received a non-codemod step".into()]));
        };
        if !self.transforms.contains_key(&payload.codemod) {
            return Ok(ValidationResult::invalid(vec![format!("unknown codemod '{}'", payload.codemod)]));
        }
        if payload.files.is_empty() {
            return Ok(ValidationResult::invalid(vec!["codemod step requires at least one file".into()]));
        }
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::CodeMod(payload) = &step.step.kind else {
            return Err(HypergenError::validation("codemod tool requires a codemod step"));
        };
        let result = StepResult::pending(&step.step.name, "codemod");

        let transform = self.transforms.get(&payload.codemod).ok_or_else(|| {
            HypergenError::tool("codemod", ToolErrorKind::CodeMod, format!("unknown codemod '{}'", payload.codemod))
        })?;

        let backup = payload
            .parameters
            .get("backup")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut transformed = Vec::new();
        let mut backups = Vec::new();

        for file in &payload.files {
            let path = paths::resolve_in_sandbox(&step.project_root, file)?;
            let content = std::fs::read_to_string(&path).map_err(|e| {
                HypergenError::tool(
                    "codemod",
                    ToolErrorKind::CodeMod,
                    format!("failed to read '{}': {e}", path.display()),
                )
            })?;

            let Some(new_content) = transform(&content, &payload.parameters)? else {
                continue;
            };

            if options.dry_run || step.dry_run {
                transformed.push(path.to_string_lossy().to_string());
                continue;
            }

            if backup {
                let backup_path = path.with_extension(format!(
                    "{}.bak",
                    path.extension().and_then(|e| e.to_str()).unwrap_or("orig")
                ));
                std::fs::write(&backup_path, &content).map_err(|e| {
                    HypergenError::tool("codemod", ToolErrorKind::CodeMod, format!("failed to write backup: {e}"))
                })?;
                backups.push(backup_path.to_string_lossy().to_string());
            }

            hypergen_template::operations::add(&path, &new_content, true).map_err(|e| {
                HypergenError::tool(
                    "codemod",
                    ToolErrorKind::CodeMod,
                    format!("failed to write '{}': {e}", path.display()),
                )
            })?;
            transformed.push(path.to_string_lossy().to_string());
        }

        Ok(StepResult {
            files_modified: transformed.clone(),
            tool_result: Some(ToolResult::CodeMod {
                files_transformed: transformed,
                backups,
            }),
            ..result.finish(StepStatus::Completed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_import_is_idempotent() {
        let content = "use std::fmt;\nfn main() {}\n";
        let mut params = HashMap::new();
        params.insert("import".to_string(), Value::String("use std::fmt;".into()));
        assert_eq!(add_import(content, &params).unwrap(), None);
    }

    #[test]
    fn add_import_inserts_after_last_import() {
        let content = "use std::fmt;\nfn main() {}\n";
        let mut params = HashMap::new();
        params.insert("import".to_string(), Value::String("use std::io;".into()));
        let updated = add_import(content, &params).unwrap().unwrap();
        assert!(updated.contains("use std::fmt;\nuse std::io;"));
    }

    #[test]
    fn replace_text_supports_regex() {
        let content = "const x = 1;";
        let mut params = HashMap::new();
        params.insert("find".to_string(), Value::String(r"\d+".into()));
        params.insert("replace".to_string(), Value::String("2".into()));
        params.insert("regex".to_string(), Value::Bool(true));
        assert_eq!(replace_text(content, &params).unwrap().unwrap(), "const x = 2;");
    }
}
