//! ABOUTME: The EnsureDirs tool: recursively creates one or more directories
//! ABOUTME: under the sandbox root, reporting which already existed (spec.md §4.9)

use async_trait::async_trait;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::result::{StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

use crate::paths;

pub struct EnsureDirsTool;

#[async_trait]
impl Tool for EnsureDirsTool {
    fn name(&self) -> &str {
        "ensureDirs"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::EnsureDirs(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["ensureDirs tool received a non-ensureDirs step".into()]));
        };
        if payload.paths.is_empty() {
            return Ok(ValidationResult::invalid(vec!["ensureDirs step requires at least one path".into()]));
        }
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::EnsureDirs(payload) = &step.step.kind else {
            return Err(HypergenError::validation("ensureDirs tool requires an ensureDirs step"));
        };
        let result = StepResult::pending(&step.step.name, "ensureDirs");

        let mut resolved = Vec::new();
        let mut created = Vec::new();
        let mut already_existed = Vec::new();

        for raw in &payload.paths {
            let path = paths::resolve_in_sandbox(&step.project_root, raw)?;
            resolved.push(path.to_string_lossy().to_string());

            if path.is_dir() {
                already_existed.push(path.to_string_lossy().to_string());
                continue;
            }

            if options.dry_run || step.dry_run {
                created.push(path.to_string_lossy().to_string());
                continue;
            }

            std::fs::create_dir_all(&path).map_err(|e| {
                HypergenError::tool(
                    "ensureDirs",
                    ToolErrorKind::EnsureDirs,
                    format!("failed to create '{}': {e}", path.display()),
                )
            })?;
            created.push(path.to_string_lossy().to_string());
        }

        Ok(StepResult {
            files_created: created.clone(),
            tool_result: Some(ToolResult::EnsureDirs {
                paths: resolved,
                created,
                already_existed,
            }),
            ..result.finish(StepStatus::Completed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypergen_core::context::StepContext as Ctx;
    use hypergen_core::step::{EnsureDirsStep, Step};
    use hypergen_core::RecipeIdentity;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn creates_missing_directories_and_reports_existing() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("existing")).unwrap();

        let step = Step {
            name: "make-dirs".into(),
            description: None,
            when: None,
            depends_on: vec![],
            parallel: false,
            continue_on_error: false,
            timeout_ms: None,
            retries: 0,
            variables: HashMap::new(),
            environment: HashMap::new(),
            exports: HashMap::new(),
            kind: StepKind::EnsureDirs(EnsureDirsStep {
                paths: vec!["existing".into(), "new/nested".into()],
            }),
        };
        let ctx = Ctx::new(
            step,
            Default::default(),
            dir.path().to_path_buf(),
            RecipeIdentity { recipe_id: "r".into(), variable_fingerprint: "f".into() },
        );

        let tool = EnsureDirsTool;
        let result = tool.execute(&ctx, ExecuteOptions::default()).await.unwrap();
        match result.tool_result {
            Some(ToolResult::EnsureDirs { created, already_existed, .. }) => {
                assert_eq!(created.len(), 1);
                assert_eq!(already_existed.len(), 1);
            }
            _ => panic!("expected EnsureDirs tool result"),
        }
        assert!(dir.path().join("new/nested").is_dir());
    }
}
