//! ABOUTME: The Sequence tool: runs child steps in order, threading each child's
//! ABOUTME: exports into the next child's variable bag (spec.md §4.10)

use async_trait::async_trait;
use serde_json::Value;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result};
use hypergen_core::recursion::SharedStepRunner;
use hypergen_core::result::{StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

/// Clone `parent`'s ambient fields for a child step, substituting
/// `variables`. `StepContext` carries no `Clone` impl (tools should never
/// retain one past their own call), so this rebuilds it field by field.
fn child_parent_context(parent: &StepContext, variables: hypergen_core::Variables) -> StepContext {
    StepContext {
        step: parent.step.clone(),
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

pub struct SequenceTool {
    step_runner: SharedStepRunner,
}

impl SequenceTool {
    pub fn new(step_runner: SharedStepRunner) -> Self {
        Self { step_runner }
    }
}

#[async_trait]
impl Tool for SequenceTool {
    fn name(&self) -> &str {
        "sequence"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::Sequence(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["sequence tool received a non-sequence step".into()]));
        };
        if payload.steps.is_empty() {
            return Ok(ValidationResult::invalid(vec!["sequence step requires at least one child step".into()]));
        }
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, _options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::Sequence(payload) = &step.step.kind else {
            return Err(HypergenError::validation("sequence tool requires a sequence step"));
        };
        let result = StepResult::pending(&step.step.name, "sequence");

        let mut accumulated = step.variables.clone();
        let mut child_results = Vec::with_capacity(payload.steps.len());
        let mut has_fatal_failure = false;

        for child in &payload.steps {
            let child_parent = child_parent_context(step, accumulated.clone());
            let child_result = match self.step_runner.run_step(child, &child_parent).await {
                Ok(child_result) => child_result,
                // The executor only propagates `Err` for a child whose own
                // `continueOnError` is false; capture it as a failed leaf
                // instead of discarding every result collected so far
                // (spec.md §4.7: "failed if any child failed and
                // continueOnError is false on that child").
                Err(err) => StepResult {
                    error: Some(err.to_string()),
                    ..StepResult::pending(&child.name, child.tool_name()).finish(StepStatus::Failed)
                },
            };

            if let Some(Value::Object(exports)) = child_result.metadata.get("exports") {
                for (key, value) in exports {
                    accumulated.insert(key.clone(), value.clone());
                }
            }
            let is_fatal = child_result.status == StepStatus::Failed && !child.continue_on_error;
            has_fatal_failure |= is_fatal;
            child_results.push(child_result);
            // A non-continueOnError failure stops the sequence: later
            // children would run against a context that assumed the failed
            // child had already produced its exports.
            if is_fatal {
                break;
            }
        }

        let status = if has_fatal_failure { StepStatus::Failed } else { StepStatus::Completed };
        Ok(StepResult {
            tool_result: Some(ToolResult::Sequence { steps: child_results }),
            ..result.finish(status)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hypergen_core::context::RecipeIdentity;
    use hypergen_core::error::HypergenError;
    use hypergen_core::step::{SequenceStep, Step, StepKind};
    use hypergen_core::tool::ExecuteOptions;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn child_step(name: &str, continue_on_error: bool) -> Step {
        Step {
            name: name.into(),
            description: None,
            when: None,
            depends_on: vec![],
            parallel: false,
            continue_on_error,
            timeout_ms: None,
            retries: 0,
            variables: HashMap::new(),
            environment: HashMap::new(),
            exports: HashMap::new(),
            kind: StepKind::EnsureDirs(hypergen_core::step::EnsureDirsStep { paths: vec![] }),
        }
    }

    /// Fails every step named "broken"; completes everything else.
    struct FailingRunner;

    #[async_trait]
    impl hypergen_core::recursion::StepRunner for FailingRunner {
        async fn run_step(&self, step: &Step, _parent: &StepContext) -> Result<StepResult> {
            if step.name == "broken" {
                return Err(HypergenError::tool("ensureDirs", hypergen_core::error::ToolErrorKind::FileWrite, "boom"));
            }
            Ok(StepResult::pending(&step.name, step.tool_name()).finish(StepStatus::Completed))
        }
    }

    fn sequence_context(children: Vec<Step>) -> StepContext {
        let step = Step {
            kind: StepKind::Sequence(SequenceStep { steps: children }),
            ..child_step("fanout", false)
        };
        StepContext::new(
            step,
            Default::default(),
            std::path::PathBuf::from("/project"),
            RecipeIdentity { recipe_id: "r".into(), variable_fingerprint: "f".into() },
        )
    }

    #[tokio::test]
    async fn a_fatal_child_failure_keeps_prior_results_and_fails_the_sequence() {
        let tool = SequenceTool::new(Arc::new(FailingRunner));
        let ctx = sequence_context(vec![child_step("ok", false), child_step("broken", false), child_step("never-runs", false)]);

        let result = tool.execute(&ctx, ExecuteOptions::default()).await.unwrap();
        assert_eq!(result.status, StepStatus::Failed);
        let Some(ToolResult::Sequence { steps }) = result.tool_result else { panic!("expected Sequence") };
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].status, StepStatus::Completed);
        assert_eq!(steps[1].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn a_continue_on_error_child_failure_does_not_fail_the_sequence() {
        let tool = SequenceTool::new(Arc::new(FailingRunner));
        let ctx = sequence_context(vec![child_step("ok", false), child_step("broken", true), child_step("also-ok", false)]);

        let result = tool.execute(&ctx, ExecuteOptions::default()).await.unwrap();
        assert_eq!(result.status, StepStatus::Completed);
        let Some(ToolResult::Sequence { steps }) = result.tool_result else { panic!("expected Sequence") };
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].status, StepStatus::Failed);
        assert_eq!(steps[2].status, StepStatus::Completed);
    }
}
