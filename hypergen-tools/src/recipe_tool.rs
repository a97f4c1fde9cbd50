//! ABOUTME: The Recipe tool: recursively invokes a nested recipe through the injected
//! ABOUTME: `RecipeRunner`, merging its `provides` into the parent's variables (spec.md §4.5)

use std::collections::HashMap;

use async_trait::async_trait;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::execution::{EngineOptions, RecipeSource};
use hypergen_core::recursion::SharedRecipeRunner;
use hypergen_core::result::{StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

use crate::paths;

pub struct RecipeTool {
    recipe_runner: SharedRecipeRunner,
}

impl RecipeTool {
    pub fn new(recipe_runner: SharedRecipeRunner) -> Self {
        Self { recipe_runner }
    }
}

#[async_trait]
impl Tool for RecipeTool {
    fn name(&self) -> &str {
        "recipe"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::Recipe(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["recipe tool received a non-recipe step".into()]));
        };
        if payload.recipe.trim().is_empty() {
            return Ok(ValidationResult::invalid(vec!["recipe step requires a recipe reference".into()]));
        }
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::Recipe(payload) = &step.step.kind else {
            return Err(HypergenError::validation("recipe tool requires a recipe step"));
        };
        let result = StepResult::pending(&step.step.name, "recipe");

        let mut variables: HashMap<String, serde_json::Value> = if payload.inherit_variables {
            step.variables.as_map().clone()
        } else {
            HashMap::new()
        };
        for (key, value) in &payload.variable_overrides {
            variables.insert(key.clone(), value.clone());
        }

        let source = if payload.recipe.ends_with(".yaml") || payload.recipe.ends_with(".yml") {
            RecipeSource::File(paths::resolve_in_sandbox(&step.project_root, &payload.recipe)?)
        } else {
            RecipeSource::File(step.project_root.join(&payload.recipe))
        };

        let engine_options = EngineOptions {
            variables,
            working_dir: step.project_root.clone(),
            skip_prompts: step.skip_prompts,
            dry_run: step.dry_run || options.dry_run,
            force: step.force || options.force,
            answers: step.answers.clone(),
            collect_mode: Some(step.collect_mode),
            on_message: None,
            on_step_result: None,
        };

        let execution = self.recipe_runner.run_recipe(source, engine_options).await?;

        if !execution.success && !step.step.continue_on_error {
            return Err(HypergenError::tool(
                "recipe",
                ToolErrorKind::Recipe,
                execution
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("nested recipe '{}' failed", payload.recipe)),
            ));
        }

        let status = if execution.success { StepStatus::Completed } else { StepStatus::Failed };

        let mut result = StepResult {
            error: execution.error.clone(),
            tool_result: Some(ToolResult::Recipe { provides: execution.provides.clone() }),
            ..result.finish(status)
        };
        // Fold the child's `provides` into `metadata["exports"]` so they chain
        // forward into the parent's variables the same way every other tool's
        // exports do (spec.md §4.5: "merged into parent variables for
        // subsequent steps").
        if !execution.provides.is_empty() {
            result.metadata.insert(
                "exports".to_string(),
                serde_json::Value::Object(execution.provides.clone().into_iter().collect()),
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypergen_core::context::RecipeIdentity;
    use hypergen_core::result::ExecutionMetadata;
    use hypergen_core::step::{RecipeStepPayload, Step};
    use std::collections::HashMap as Map;

    /// Always succeeds, returning a fixed `provides` map regardless of input.
    struct StubRunner;

    #[async_trait]
    impl hypergen_core::recursion::RecipeRunner for StubRunner {
        async fn run_recipe(&self, _source: RecipeSource, _options: EngineOptions) -> Result<hypergen_core::execution::RecipeExecution> {
            let mut provides = Map::new();
            provides.insert("greeting".to_string(), serde_json::Value::String("hi".into()));
            Ok(hypergen_core::execution::RecipeExecution {
                recipe_name: "child".into(),
                success: true,
                step_results: vec![],
                metadata: ExecutionMetadata::from_results(&[], "/project".to_string()),
                provides,
                rendered_message: None,
                deferred_prompt: None,
                error: None,
            })
        }
    }

    fn recipe_step_context() -> StepContext {
        let step = Step {
            name: "nested".into(),
            description: None,
            when: None,
            depends_on: vec![],
            parallel: false,
            continue_on_error: false,
            timeout_ms: None,
            retries: 0,
            variables: Map::new(),
            environment: Map::new(),
            exports: Map::new(),
            kind: StepKind::Recipe(RecipeStepPayload {
                recipe: "child.yaml".into(),
                inherit_variables: false,
                variable_overrides: Map::new(),
            }),
        };
        StepContext::new(
            step,
            Default::default(),
            std::path::PathBuf::from("/project"),
            RecipeIdentity { recipe_id: "r".into(), variable_fingerprint: "f".into() },
        )
    }

    #[tokio::test]
    async fn child_provides_are_folded_into_metadata_exports() {
        let tool = RecipeTool::new(std::sync::Arc::new(StubRunner));
        let ctx = recipe_step_context();
        let result = tool.execute(&ctx, ExecuteOptions::default()).await.unwrap();

        assert_eq!(result.status, StepStatus::Completed);
        let exports = result.metadata.get("exports").expect("exports should be populated");
        assert_eq!(exports["greeting"], serde_json::Value::String("hi".into()));
    }
}
