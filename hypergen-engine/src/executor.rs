//! ABOUTME: The Step Executor: runs one step end to end — dependsOn, when, tool resolution,
//! ABOUTME: validate, execute-with-timeout, retry-with-backoff, continueOnError, exports
//! ABOUTME: (spec.md §4.10). Implements `hypergen_core::StepRunner` so Sequence/Parallel/Recipe
//! ABOUTME: tools can re-enter it without a dependency from `hypergen-tools` back to this crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result};
use hypergen_core::recursion::StepRunner;
use hypergen_core::result::{StepResult, StepStatus};
use hypergen_core::step::Step;
use hypergen_core::tool::ExecuteOptions;
use hypergen_tools::ToolRegistry;

use hypergen_template::engine::TemplateEngine;

use crate::config::EngineConfig;
use crate::output_evaluator::evaluate_exports;

/// Rebuild a child `StepContext` for `step`, layering its own `variables:`
/// over the ambient ones and otherwise carrying `parent`'s fields forward
/// verbatim. `StepContext` has no `Clone` impl by design (tools shouldn't
/// retain one past their own call), so this is a field-by-field copy.
fn child_context(step: Step, parent: &StepContext) -> StepContext {
    let variables = parent.variables.merged_with(&step.step_variables());
    StepContext {
        step,
        variables,
        project_root: parent.project_root.clone(),
        prior_results: parent.prior_results.clone(),
        recipe_identity: parent.recipe_identity.clone(),
        condition_helpers: parent.condition_helpers.clone(),
        answers: parent.answers.clone(),
        collect_mode: parent.collect_mode,
        dry_run: parent.dry_run,
        force: parent.force,
        skip_prompts: parent.skip_prompts,
    }
}

fn skipped(step_name: &str, tool_name: &str, dependencies_satisfied: bool, condition_result: Option<bool>) -> StepResult {
    StepResult {
        dependencies_satisfied,
        condition_result,
        ..StepResult::pending(step_name, tool_name).finish(StepStatus::Skipped)
    }
}

pub struct StepExecutor {
    registry: Arc<ToolRegistry>,
    template_engine: Arc<dyn TemplateEngine>,
    config: EngineConfig,
}

impl StepExecutor {
    pub fn new(registry: Arc<ToolRegistry>, template_engine: Arc<dyn TemplateEngine>, config: EngineConfig) -> Self {
        Self { registry, template_engine, config }
    }

    fn dependencies_satisfied(&self, step: &Step, ctx: &StepContext) -> bool {
        step.depends_on.iter().all(|dep| {
            ctx.prior_results
                .get(dep)
                .map(|r| r.status == StepStatus::Completed)
                .unwrap_or(false)
        })
    }

    async fn run_with_timeout(
        &self,
        tool: &Arc<dyn hypergen_core::tool::Tool>,
        ctx: &StepContext,
        options: ExecuteOptions,
        timeout_ms: u64,
    ) -> Result<StepResult> {
        match tokio::time::timeout(Duration::from_millis(timeout_ms), tool.execute(ctx, options)).await {
            Ok(result) => result,
            Err(_) => Err(HypergenError::Timeout {
                step: ctx.step.name.clone(),
                elapsed_ms: timeout_ms,
                limit_ms: timeout_ms,
            }),
        }
    }
}

#[async_trait]
impl StepRunner for StepExecutor {
    async fn run_step(&self, step: &Step, parent: &StepContext) -> Result<StepResult> {
        let ctx = child_context(step.clone(), parent);
        let tool_name = step.tool_name();

        // (1) dependsOn.
        if !self.dependencies_satisfied(step, &ctx) {
            debug!(step = %step.name, "skipping: unsatisfied dependsOn");
            return Ok(skipped(&step.name, tool_name, false, None));
        }

        // (2) when.
        let condition_result = if let Some(expr) = &step.when {
            let satisfied = hypergen_core::eval_when(expr, &ctx.variables, ctx.condition_helpers.as_ref());
            if !satisfied {
                return Ok(skipped(&step.name, tool_name, true, Some(false)));
            }
            Some(true)
        } else {
            None
        };

        // (4) resolve tool.
        let tool = self.registry.resolve(tool_name)?;

        // (5) validate.
        let validation = tool.validate(&ctx).await?;
        if !validation.is_valid {
            let err = HypergenError::validation(validation.errors.join("; "));
            if step.continue_on_error {
                return Ok(failed(&step.name, tool_name, condition_result, &err));
            }
            return Err(err);
        }

        // (6)+(7) execute with timeout, retrying retriable failures.
        let timeout_ms = step.timeout_ms.unwrap_or(self.config.default_timeout_ms);
        let policy = self.config.retry.as_policy();
        let max_attempts = step.retries + 1;

        let mut attempt = 0u32;
        let mut last_err;
        loop {
            match self.run_with_timeout(&tool, &ctx, ExecuteOptions { dry_run: ctx.dry_run, force: ctx.force }, timeout_ms).await {
                Ok(mut result) => {
                    result.retry_count = attempt;
                    result.condition_result = condition_result;

                    // Some tools (e.g. Query) already populate `metadata["exports"]`
                    // themselves, using export names as dot-paths into their own
                    // produced data rather than as generic sandboxed expressions
                    // against `{result, step, status, ...variables}`. Don't let the
                    // generic pass clobber a tool-native export with an empty one.
                    if !result.metadata.contains_key("exports") {
                        let exports = evaluate_exports(
                            &step.exports,
                            &step.name,
                            "completed",
                            result.tool_result.as_ref(),
                            &ctx.variables,
                            ctx.condition_helpers.as_ref(),
                            self.template_engine.as_ref(),
                        );
                        if !exports.is_empty() {
                            result
                                .metadata
                                .insert("exports".to_string(), serde_json::Value::Object(exports.into_iter().collect()));
                        }
                    }

                    // The Prompt tool binds its answer to `payload.variable`, not
                    // through a declared `exports:` expression (spec.md §3: the
                    // step itself names the target variable). Fold that in as an
                    // implicit export so it chains forward like any other.
                    if let hypergen_core::step::StepKind::Prompt(payload) = &step.kind {
                        if let Some(hypergen_core::result::ToolResult::Prompt { value }) = &result.tool_result {
                            let mut merged = match result.metadata.remove("exports") {
                                Some(serde_json::Value::Object(map)) => map,
                                _ => serde_json::Map::new(),
                            };
                            merged.insert(payload.variable.clone(), value.clone());
                            result.metadata.insert("exports".to_string(), serde_json::Value::Object(merged));
                        }
                    }

                    return Ok(result);
                }
                Err(err) => {
                    last_err = err;
                }
            }

            let retriable = last_err.is_retriable();
            if !retriable || attempt + 1 >= max_attempts {
                break;
            }
            let delay = policy.delay_for(attempt);
            warn!(step = %step.name, attempt, delay_ms = delay.as_millis() as u64, "step failed, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }

        if step.continue_on_error {
            return Ok(failed(&step.name, tool_name, condition_result, &last_err));
        }
        Err(last_err)
    }
}

fn failed(step_name: &str, tool_name: &str, condition_result: Option<bool>, err: &HypergenError) -> StepResult {
    StepResult {
        error: Some(err.to_string()),
        condition_result,
        ..StepResult::pending(step_name, tool_name).finish(StepStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypergen_core::context::StepContext as Ctx;
    use hypergen_core::step::{CodeModStep, StepKind, TemplateStep};
    use hypergen_core::RecipeIdentity;
    use hypergen_template::jig::JigEngine;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn template_step(name: &str, template: &str) -> Step {
        Step {
            name: name.into(),
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
            kind: StepKind::Template(TemplateStep {
                template: template.into(),
                output_dir: None,
                overwrite: None,
                exclude: vec![],
            }),
        }
    }

    fn ctx_in(dir: &std::path::Path) -> Ctx {
        Ctx::new(
            template_step("base", "unused.jig"),
            Default::default(),
            dir.to_path_buf(),
            RecipeIdentity { recipe_id: "r".into(), variable_fingerprint: "f".into() },
        )
    }

    fn executor() -> StepExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(hypergen_tools::TemplateTool::new(Arc::new(JigEngine::new()))));
        registry.register(Arc::new(hypergen_tools::CodeModTool::new()));
        StepExecutor::new(Arc::new(registry), Arc::new(JigEngine::new()), EngineConfig::default())
    }

    #[tokio::test]
    async fn unsatisfied_dependency_skips_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let mut step = template_step("dependent", "unused.jig");
        step.depends_on = vec!["missing".into()];
        let result = executor().run_step(&step, &ctx_in(dir.path())).await.unwrap();
        assert_eq!(result.status, StepStatus::Skipped);
        assert!(!result.dependencies_satisfied);
    }

    #[tokio::test]
    async fn false_when_skips_the_step() {
        let dir = tempfile::tempdir().unwrap();
        let mut step = template_step("conditional", "unused.jig");
        step.when = Some("false".to_string());
        let result = executor().run_step(&step, &ctx_in(dir.path())).await.unwrap();
        assert_eq!(result.status, StepStatus::Skipped);
        assert_eq!(result.condition_result, Some(false));
    }

    #[tokio::test]
    async fn invalid_step_aborts_without_continue_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let step = Step {
            kind: StepKind::CodeMod(CodeModStep {
                codemod: "no-such-transform".into(),
                files: vec!["a.txt".into()],
                parameters: HashMap::new(),
            }),
            ..template_step("bad-codemod", "unused.jig")
        };
        let result = executor().run_step(&step, &ctx_in(dir.path())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn invalid_step_with_continue_on_error_becomes_a_failed_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let mut step = Step {
            kind: StepKind::CodeMod(CodeModStep {
                codemod: "no-such-transform".into(),
                files: vec!["a.txt".into()],
                parameters: HashMap::new(),
            }),
            ..template_step("bad-codemod", "unused.jig")
        };
        step.continue_on_error = true;
        let result = executor().run_step(&step, &ctx_in(dir.path())).await.unwrap();
        assert_eq!(result.status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn successful_step_populates_exports_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.jig"), "Hi {{ name }}").unwrap();

        let mut step = template_step("greet", "hello.jig");
        step.exports.insert("shout".to_string(), "'Hi ' + name".to_string());

        let mut ctx = ctx_in(dir.path());
        ctx.variables.insert("name", serde_json::Value::String("world".into()));

        let result = executor().run_step(&step, &ctx).await.unwrap();
        assert_eq!(result.status, StepStatus::Completed);
        let exports = result.metadata.get("exports").unwrap();
        assert_eq!(exports["shout"], serde_json::Value::String("Hi world".into()));
    }
}
