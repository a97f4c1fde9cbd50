//! ABOUTME: The Parallel tool: runs child steps concurrently, bounded by an optional
//! ABOUTME: `limit`, via `tokio::task::JoinSet` (spec.md §4.10); the only real concurrency in the engine

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::recursion::SharedStepRunner;
use hypergen_core::result::{StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

fn owned_child_context(parent: &StepContext) -> StepContext {
    StepContext {
        step: parent.step.clone(),
        variables: parent.variables.clone(),
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

pub struct ParallelTool {
    step_runner: SharedStepRunner,
}

impl ParallelTool {
    pub fn new(step_runner: SharedStepRunner) -> Self {
        Self { step_runner }
    }
}

#[async_trait]
impl Tool for ParallelTool {
    fn name(&self) -> &str {
        "parallel"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::Parallel(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["parallel tool received a non-parallel step".into()]));
        };
        if payload.steps.is_empty() {
            return Ok(ValidationResult::invalid(vec!["parallel step requires at least one child step".into()]));
        }
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, _options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::Parallel(payload) = &step.step.kind else {
            return Err(HypergenError::validation("parallel tool requires a parallel step"));
        };
        let result = StepResult::pending(&step.step.name, "parallel");

        let limit = payload.limit.unwrap_or(payload.steps.len().max(1)).max(1);
        let semaphore = Arc::new(Semaphore::new(limit));

        let mut set: JoinSet<(usize, bool, StepResult)> = JoinSet::new();
        for (index, child) in payload.steps.iter().cloned().enumerate() {
            let sem = semaphore.clone();
            let runner = self.step_runner.clone();
            let child_parent = owned_child_context(step);
            let continue_on_error = child.continue_on_error;
            set.spawn(async move {
                let _permit = sem.acquire_owned().await.expect("semaphore never closed");
                // The executor only propagates `Err` for a child whose own
                // `continueOnError` is false; capture it as a failed leaf
                // instead of letting a sibling's panic/`?` discard every
                // result collected from the other concurrent children
                // (spec.md §4.7: "failed if any child failed and
                // continueOnError is false on that child").
                let result = match runner.run_step(&child, &child_parent).await {
                    Ok(result) => result,
                    Err(err) => StepResult {
                        error: Some(err.to_string()),
                        ..StepResult::pending(&child.name, child.tool_name()).finish(StepStatus::Failed)
                    },
                };
                let is_fatal = result.status == StepStatus::Failed && !continue_on_error;
                (index, is_fatal, result)
            });
        }

        let mut ordered: Vec<Option<StepResult>> = (0..payload.steps.len()).map(|_| None).collect();
        let mut has_fatal_failure = false;
        while let Some(joined) = set.join_next().await {
            let (index, is_fatal, child_result) = joined.map_err(|e| {
                HypergenError::tool("parallel", ToolErrorKind::Parallel, format!("child task panicked: {e}"))
            })?;
            has_fatal_failure |= is_fatal;
            ordered[index] = Some(child_result);
        }

        let child_results: Vec<StepResult> = ordered.into_iter().map(|r| r.expect("every index filled")).collect();

        let status = if has_fatal_failure { StepStatus::Failed } else { StepStatus::Completed };
        Ok(StepResult {
            tool_result: Some(ToolResult::Parallel { steps: child_results }),
            ..result.finish(status)
        })
    }
}
