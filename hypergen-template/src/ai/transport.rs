//! ABOUTME: Pluggable AI-answer transports: stdout (defer), command (subprocess), api (LLM SDK)
//! ABOUTME: Brokers between the assembled prompt and `{key -> answer}` (spec.md §4.8)

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use hypergen_core::{HypergenError, Result};

use super::assembler::AssembledPrompt;

#[derive(Debug, Clone)]
pub enum TransportOutcome {
    /// The caller must re-run with `--answers <path>`; `exit_code` is the
    /// process exit code the CLI layer (out of scope here) should use.
    Deferred { exit_code: i32 },
    Resolved { answers: HashMap<String, String> },
}

#[async_trait]
pub trait AiTransport: Send + Sync {
    async fn resolve(&self, prompt: &AssembledPrompt) -> Result<TransportOutcome>;
}

/// Writes the prompt to stdout and defers resolution to an external
/// caller. Stdout is reserved for this during a run (spec.md §7).
pub struct StdoutTransport;

#[async_trait]
impl AiTransport for StdoutTransport {
    async fn resolve(&self, prompt: &AssembledPrompt) -> Result<TransportOutcome> {
        println!("{}", prompt.markdown);
        Ok(TransportOutcome::Deferred { exit_code: 2 })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    /// One invocation receives the full prompt and returns all answers as
    /// one JSON object.
    Batched,
    /// One invocation per key, raw text response.
    PerBlock,
}

/// Spawns a configured subprocess to resolve the prompt.
pub struct CommandTransport {
    pub command: String,
    pub args: Vec<String>,
    pub mode: CommandMode,
    pub keys: Vec<String>,
}

impl CommandTransport {
    fn substitute_prompt(&self, prompt_text: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace("{prompt}", prompt_text))
            .collect()
    }

    async fn run(&self, args: &[String], stdin_payload: Option<&str>) -> Result<String> {
        let mut cmd = Command::new(&self.command);
        cmd.args(args);
        cmd.env_remove("CLAUDECODE");
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            HypergenError::AiTransport {
                message: format!("failed to spawn command transport '{}': {e}", self.command),
                cause: None,
            }
        })?;

        if let Some(payload) = stdin_payload {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(payload.as_bytes()).await;
            }
        }
        drop(child.stdin.take());

        let output = child.wait_with_output().await.map_err(|e| HypergenError::AiTransport {
            message: format!("command transport failed: {e}"),
            cause: None,
        })?;

        if !output.status.success() {
            return Err(HypergenError::AiTransport {
                message: format!(
                    "command transport exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr)
                ),
                cause: None,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl AiTransport for CommandTransport {
    async fn resolve(&self, prompt: &AssembledPrompt) -> Result<TransportOutcome> {
        match self.mode {
            CommandMode::Batched => {
                let uses_placeholder = self.args.iter().any(|a| a.contains("{prompt}"));
                let args = self.substitute_prompt(&prompt.markdown);
                let stdin_payload = if uses_placeholder { None } else { Some(prompt.markdown.as_str()) };
                let raw = self.run(&args, stdin_payload).await?;
                let json = extract_json_object(&raw).ok_or_else(|| HypergenError::AiTransport {
                    message: "command transport response did not contain a JSON object".into(),
                    cause: None,
                })?;
                let answers = parse_answers(&json, &self.keys)?;
                Ok(TransportOutcome::Resolved { answers })
            }
            CommandMode::PerBlock => {
                let mut answers = HashMap::new();
                for key in &self.keys {
                    let args = self.substitute_prompt(&prompt.markdown);
                    let raw = self.run(&args, Some(key)).await?;
                    answers.insert(key.clone(), strip_fences(&raw).trim().to_string());
                }
                Ok(TransportOutcome::Resolved { answers })
            }
        }
    }
}

/// Pluggable LLM SDK boundary. The core ships no concrete client — a
/// caller supplies one (spec.md §1's "any specific LLM SDK" is out of
/// scope for this core).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        temperature: Option<f64>,
        max_tokens: Option<u64>,
    ) -> std::result::Result<String, anyhow::Error>;
}

pub struct ApiTransport {
    pub client: std::sync::Arc<dyn LlmClient>,
    pub system: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    pub retries: u32,
    pub keys: Vec<String>,
}

#[async_trait]
impl AiTransport for ApiTransport {
    async fn resolve(&self, prompt: &AssembledPrompt) -> Result<TransportOutcome> {
        let mut attempt = 0;
        loop {
            let result = self
                .client
                .complete(self.system.as_deref(), &prompt.markdown, self.temperature, self.max_tokens)
                .await;

            match result {
                Ok(raw) => {
                    let json = extract_json_object(&raw).ok_or_else(|| HypergenError::AiTransport {
                        message: "API transport response was not a JSON object".into(),
                        cause: None,
                    })?;
                    let answers = parse_answers(&json, &self.keys)?;
                    return Ok(TransportOutcome::Resolved { answers });
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "AI transport call failed, retrying");
                    continue;
                }
                Err(e) => {
                    return Err(HypergenError::AiTransport {
                        message: "API transport exhausted retries".into(),
                        cause: Some(e),
                    })
                }
            }
        }
    }
}

/// Strips Markdown code fences and extracts the outermost `{...}` object.
fn extract_json_object(raw: &str) -> Option<serde_json::Value> {
    let cleaned = strip_fences(raw);
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&cleaned[start..=end]).ok()
}

fn strip_fences(raw: &str) -> String {
    let fence_re = Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap();
    if let Some(caps) = fence_re.captures(raw) {
        caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_else(|| raw.to_string())
    } else {
        raw.to_string()
    }
}

fn parse_answers(json: &serde_json::Value, keys: &[String]) -> Result<HashMap<String, String>> {
    let obj = json.as_object().ok_or_else(|| HypergenError::AiTransport {
        message: "expected a JSON object response".into(),
        cause: None,
    })?;

    let mut answers = HashMap::new();
    let mut missing = Vec::new();
    for key in keys {
        match obj.get(key) {
            Some(serde_json::Value::String(s)) => {
                answers.insert(key.clone(), s.clone());
            }
            Some(other) => {
                answers.insert(key.clone(), other.to_string());
            }
            None => missing.push(key.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(HypergenError::AiTransport {
            message: format!("response is missing keys: {}", missing.join(", ")),
            cause: None,
        });
    }

    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_object_strips_markdown_fences() {
        let raw = "Here you go:\n```json\n{\"a\": \"1\", \"b\": \"2\"}\n```\n";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["a"], "1");
    }

    #[test]
    fn parse_answers_errors_on_missing_keys() {
        let json = serde_json::json!({ "a": "1" });
        let result = parse_answers(&json, &["a".to_string(), "b".to_string()]);
        assert!(result.is_err());
    }
}
