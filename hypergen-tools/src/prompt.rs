//! ABOUTME: The Prompt tool: interactive variable collection, falling back to
//! ABOUTME: `default` under `skipPrompts`/`dryRun`/non-interactive hosts (spec.md §4.7)

use std::io::Write;

use async_trait::async_trait;
use serde_json::Value;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::result::{StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

/// Abstracts over an interactive terminal so the tool can be exercised
/// without a real TTY. `HostPrompter` is the production implementation;
/// tests supply a canned one.
pub trait Prompter: Send + Sync {
    fn prompt_line(&self, message: &str) -> Result<String>;
    fn prompt_confirm(&self, message: &str) -> Result<bool>;
}

pub struct HostPrompter;

impl Prompter for HostPrompter {
    fn prompt_line(&self, message: &str) -> Result<String> {
        print!("{message} ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map_err(|e| HypergenError::tool("prompt", ToolErrorKind::Prompt, format!("failed to read stdin: {e}")))?;
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }

    fn prompt_confirm(&self, message: &str) -> Result<bool> {
        let answer = self.prompt_line(&format!("{message} [y/N]"))?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

fn coerce_answer(prompt_type: &str, raw: &str, options: &[String]) -> Result<Value> {
    match prompt_type {
        "confirm" => Ok(Value::Bool(matches!(raw.trim().to_lowercase().as_str(), "y" | "yes" | "true"))),
        "number" => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| HypergenError::validation(format!("'{raw}' is not a valid number"))),
        "select" => {
            if options.iter().any(|o| o == raw.trim()) {
                Ok(Value::String(raw.trim().to_string()))
            } else {
                Err(HypergenError::validation(format!("'{raw}' is not one of {options:?}")))
            }
        }
        _ => Ok(Value::String(raw.to_string())),
    }
}

pub struct PromptTool {
    prompter: Box<dyn Prompter>,
}

impl PromptTool {
    pub fn new(prompter: Box<dyn Prompter>) -> Self {
        Self { prompter }
    }
}

impl Default for PromptTool {
    fn default() -> Self {
        Self::new(Box::new(HostPrompter))
    }
}

#[async_trait]
impl Tool for PromptTool {
    fn name(&self) -> &str {
        "prompt"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::Prompt(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["prompt tool received a non-prompt step".into()]));
        };
        if payload.variable.trim().is_empty() {
            return Ok(ValidationResult::invalid(vec!["prompt step requires a target variable".into()]));
        }
        if payload.prompt_type == "select" && payload.options.is_empty() {
            return Ok(ValidationResult::invalid(vec!["promptType 'select' requires non-empty options".into()]));
        }
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::Prompt(payload) = &step.step.kind else {
            return Err(HypergenError::validation("prompt tool requires a prompt step"));
        };
        let result = StepResult::pending(&step.step.name, "prompt");

        let skip = step.skip_prompts || step.dry_run || options.dry_run;

        let value = if skip {
            payload
                .default
                .clone()
                .ok_or_else(|| HypergenError::tool("prompt", ToolErrorKind::Prompt, "prompt skipped but no default was provided"))?
        } else {
            let message = payload.message.clone().unwrap_or_else(|| payload.variable.clone());
            let raw = if payload.prompt_type == "confirm" {
                return Ok(finish(result, self.prompter.prompt_confirm(&message).map(Value::Bool)?));
            } else {
                self.prompter.prompt_line(&message)?
            };
            if raw.trim().is_empty() {
                payload.default.clone().unwrap_or(Value::String(String::new()))
            } else {
                let coerced = coerce_answer(&payload.prompt_type, &raw, &payload.options)?;
                if let Some(expr) = &payload.validate {
                    validate_answer(expr, &coerced, step)?;
                }
                coerced
            }
        };

        Ok(finish(result, Ok(value)))
    }
}

fn finish(result: StepResult, value: Result<Value>) -> StepResult {
    match value {
        Ok(v) => StepResult {
            output: Some(v.clone()),
            tool_result: Some(ToolResult::Prompt { value: v }),
            ..result.finish(StepStatus::Completed)
        },
        Err(e) => StepResult {
            error: Some(e.to_string()),
            ..result.finish(StepStatus::Failed)
        },
    }
}

fn validate_answer(expr: &str, value: &Value, step: &StepContext) -> Result<()> {
    let mut vars = step.variables.clone();
    vars.insert("value", value.clone());
    let ok = hypergen_core::eval_when(expr, &vars, step.condition_helpers.as_ref());
    if ok {
        Ok(())
    } else {
        Err(HypergenError::validation(format!("answer failed validation expression '{expr}'")))
    }
}
