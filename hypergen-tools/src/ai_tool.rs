//! ABOUTME: The AI tool: issues one step-level prompt through a pluggable `AiTransport`
//! ABOUTME: and applies optional guardrails to the answer (spec.md §4.8)

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::result::{AiResolutionStatus, StepResult, StepStatus, ToolResult};
use hypergen_core::step::{AiGuardrails, AiStep, StepKind};
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

use hypergen_template::ai::assembler::assemble;
use hypergen_template::ai::collector::AiBlockEntry;
use hypergen_template::ai::transport::{AiTransport, TransportOutcome};

fn render_variables(payload: &AiStep, step: &StepContext) -> String {
    let mut rendered = payload.prompt.clone();
    let vars = step.variables.to_json_object();
    if let Some(obj) = vars.as_object() {
        for (key, value) in obj {
            let token = format!("{{{{{key}}}}}");
            let replacement = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            rendered = rendered.replace(&token, &replacement);
        }
    }
    rendered
}

fn check_guardrails(guardrails: &AiGuardrails, answer: &str) -> Result<()> {
    if guardrails.validate_syntax && !braces_balanced(answer) {
        return Err(HypergenError::tool(
            "ai",
            ToolErrorKind::Ai,
            "AI answer failed syntax guardrail: unbalanced braces/parens/brackets",
        ));
    }

    if guardrails.require_known_imports {
        let imports = extract_imports(answer);
        let unknown: Vec<&String> = imports
            .iter()
            .filter(|i| !guardrails.allowed_imports.iter().any(|a| a == *i))
            .collect();
        if !unknown.is_empty() {
            return Err(HypergenError::tool(
                "ai",
                ToolErrorKind::Ai,
                format!("AI answer imports disallowed modules: {unknown:?}"),
            ));
        }
    }

    if let Some(max) = guardrails.max_tokens {
        let approx_tokens = answer.split_whitespace().count() as u64;
        if approx_tokens > max {
            return Err(HypergenError::tool(
                "ai",
                ToolErrorKind::Ai,
                format!("AI answer exceeds max_tokens guardrail ({approx_tokens} > {max})"),
            ));
        }
    }

    Ok(())
}

fn braces_balanced(text: &str) -> bool {
    let mut stack = Vec::new();
    for c in text.chars() {
        match c {
            '{' | '(' | '[' => stack.push(c),
            '}' => {
                if stack.pop() != Some('{') {
                    return false;
                }
            }
            ')' => {
                if stack.pop() != Some('(') {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}

fn extract_imports(text: &str) -> Vec<String> {
    let js_import = regex::Regex::new(r#"import\s+.*?\s+from\s+['"]([^'"]+)['"]"#).unwrap();
    let rust_use = regex::Regex::new(r"use\s+([a-zA-Z0-9_:]+)\s*;").unwrap();
    let mut imports: Vec<String> = js_import
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();
    imports.extend(
        rust_use
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string())),
    );
    imports
}

pub struct AiTool {
    transport: Arc<dyn AiTransport>,
}

impl AiTool {
    pub fn new(transport: Arc<dyn AiTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Tool for AiTool {
    fn name(&self) -> &str {
        "ai"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::Ai(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["ai tool received a non-ai step".into()]));
        };
        if payload.prompt.trim().is_empty() {
            return Ok(ValidationResult::invalid(vec!["ai step requires a non-empty prompt".into()]));
        }
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, _options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::Ai(payload) = &step.step.kind else {
            return Err(HypergenError::validation("ai tool requires an ai step"));
        };
        let result = StepResult::pending(&step.step.name, "ai");

        let key = payload.output.clone();
        let entry = AiBlockEntry {
            key: key.clone(),
            contexts: payload.context.clone(),
            prompt: render_variables(payload, step),
            output_description: payload.output.clone(),
            type_hint: None,
            examples: payload.examples.clone(),
            source_file: step.step.name.clone(),
        };

        let assembled = assemble(&[entry], &[], &format!("{}.answers.json", step.step.name));

        let outcome = self.transport.resolve(&assembled).await?;

        match outcome {
            TransportOutcome::Deferred { .. } => Ok(StepResult {
                output: Some(Value::String(assembled.markdown.clone())),
                tool_result: Some(ToolResult::Ai {
                    key,
                    status: AiResolutionStatus::Deferred,
                    answer: None,
                }),
                ..result.finish(StepStatus::Completed)
            }),
            TransportOutcome::Resolved { answers } => {
                let answer = answers.get(&key).cloned().ok_or_else(|| {
                    HypergenError::tool("ai", ToolErrorKind::Ai, format!("transport did not resolve key '{key}'"))
                })?;

                if let Some(guardrails) = &payload.guardrails {
                    check_guardrails(guardrails, &answer)?;
                }

                Ok(StepResult {
                    output: Some(Value::String(answer.clone())),
                    tool_result: Some(ToolResult::Ai {
                        key,
                        status: AiResolutionStatus::Resolved,
                        answer: Some(answer),
                    }),
                    ..result.finish(StepStatus::Completed)
                })
            }
        }
    }
}
