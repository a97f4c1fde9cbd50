//! ABOUTME: The Shell tool: runs one command through `tokio::process::Command`
//! ABOUTME: with a capped, timed-out, cwd-sandboxed subprocess (spec.md §4.6)

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::result::{StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

use crate::paths;

/// Output is capped per-stream at 10 MiB (spec.md §4.6); beyond that the
/// remainder is dropped rather than buffered unbounded.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_TIMEOUT_MS: u64 = 5 * 60 * 1000;

pub struct ShellTool;

async fn read_capped(mut reader: impl tokio::io::AsyncRead + Unpin) -> String {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < MAX_OUTPUT_BYTES {
                    let remaining = MAX_OUTPUT_BYTES - buf.len();
                    buf.extend_from_slice(&chunk[..n.min(remaining)]);
                }
            }
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::Shell(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["shell tool received a non-shell step".into()]));
        };
        if payload.command.trim().is_empty() {
            return Ok(ValidationResult::invalid(vec!["shell step requires a non-empty command".into()]));
        }
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::Shell(payload) = &step.step.kind else {
            return Err(HypergenError::validation("shell tool requires a shell step"));
        };
        let result = StepResult::pending(&step.step.name, "shell");

        let cwd = match &payload.cwd {
            Some(dir) => paths::resolve_in_sandbox(&step.project_root, dir)?,
            None => step.project_root.clone(),
        };

        if options.dry_run || step.dry_run {
            return Ok(StepResult {
                tool_result: Some(ToolResult::Shell {
                    exit_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                }),
                ..result.finish(StepStatus::Completed)
            });
        }

        let timeout_ms = step.step.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);

        let mut cmd = build_command(&payload.command);
        cmd.current_dir(&cwd);
        cmd.envs(&payload.env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            HypergenError::tool(
                "shell",
                ToolErrorKind::Shell,
                format!("failed to spawn '{}': {e}", payload.command),
            )
        })?;

        let stdout_handle = child.stdout.take().expect("piped stdout");
        let stderr_handle = child.stderr.take().expect("piped stderr");

        let run = async {
            let (stdout, stderr) = tokio::join!(read_capped(stdout_handle), read_capped(stderr_handle));
            let status = child.wait().await.map_err(|e| {
                HypergenError::tool("shell", ToolErrorKind::Shell, format!("failed to wait on child: {e}"))
            })?;
            Ok::<_, HypergenError>((status, stdout, stderr))
        };

        let (status, stdout, stderr) = match tokio::time::timeout(Duration::from_millis(timeout_ms), run).await {
            Ok(inner) => inner?,
            Err(_) => {
                let _ = child.start_kill();
                return Err(HypergenError::Timeout {
                    step: step.step.name.clone(),
                    elapsed_ms: timeout_ms,
                    limit_ms: timeout_ms,
                });
            }
        };

        let exit_code = status.code().unwrap_or(-1);

        if exit_code != 0 && !step.step.continue_on_error {
            return Err(HypergenError::tool(
                "shell",
                ToolErrorKind::Shell,
                format!("command '{}' exited with code {exit_code}: {stderr}", payload.command),
            ));
        }

        let status = if exit_code == 0 { StepStatus::Completed } else { StepStatus::Failed };

        Ok(StepResult {
            error: if exit_code == 0 { None } else { Some(stderr.clone()) },
            output: Some(serde_json::json!({ "exitCode": exit_code, "stdout": stdout, "stderr": stderr })),
            tool_result: Some(ToolResult::Shell { exit_code, stdout, stderr }),
            ..result.finish(status)
        })
    }
}

#[cfg(unix)]
fn build_command(command: &str) -> Command {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn build_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
