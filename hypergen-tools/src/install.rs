//! ABOUTME: The Install tool: detects a package manager from project lockfiles
//! ABOUTME: and runs its install command, tolerating failure only when `optional: true` (spec.md §4.6)

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::result::{StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PackageManager {
    name: &'static str,
    lockfile: &'static str,
    binary: &'static str,
}

const CANDIDATES: &[PackageManager] = &[
    PackageManager { name: "bun", lockfile: "bun.lockb", binary: "bun" },
    PackageManager { name: "pnpm", lockfile: "pnpm-lock.yaml", binary: "pnpm" },
    PackageManager { name: "yarn", lockfile: "yarn.lock", binary: "yarn" },
    PackageManager { name: "npm", lockfile: "package-lock.json", binary: "npm" },
    PackageManager { name: "cargo", lockfile: "Cargo.lock", binary: "cargo" },
    PackageManager { name: "poetry", lockfile: "poetry.lock", binary: "poetry" },
];

fn detect(project_root: &std::path::Path, forced: Option<&str>) -> Result<PackageManager> {
    if let Some(name) = forced {
        return CANDIDATES
            .iter()
            .find(|c| c.name == name)
            .copied()
            .ok_or_else(|| HypergenError::tool("install", ToolErrorKind::Install, format!("unsupported package manager '{name}'")));
    }
    CANDIDATES
        .iter()
        .find(|c| project_root.join(c.lockfile).is_file())
        .copied()
        .or_else(|| {
            if project_root.join("package.json").is_file() {
                CANDIDATES.iter().find(|c| c.name == "npm").copied()
            } else {
                None
            }
        })
        .ok_or_else(|| {
            HypergenError::tool(
                "install",
                ToolErrorKind::Install,
                "could not detect a package manager from project lockfiles",
            )
        })
}

fn install_args(manager: PackageManager, packages: &[String], dev: bool) -> Vec<String> {
    if packages.is_empty() {
        return vec!["install".to_string()];
    }
    match manager.name {
        "bun" => {
            let mut args = vec!["add".to_string()];
            if dev {
                args.push("-d".to_string());
            }
            args.extend(packages.iter().cloned());
            args
        }
        "pnpm" => {
            let mut args = vec!["add".to_string()];
            if dev {
                args.push("-D".to_string());
            }
            args.extend(packages.iter().cloned());
            args
        }
        "yarn" => {
            let mut args = vec!["add".to_string()];
            if dev {
                args.push("--dev".to_string());
            }
            args.extend(packages.iter().cloned());
            args
        }
        "npm" => {
            let mut args = vec!["install".to_string()];
            if dev {
                args.push("--save-dev".to_string());
            }
            args.extend(packages.iter().cloned());
            args
        }
        "cargo" => {
            let mut args = vec!["add".to_string()];
            if dev {
                args.push("--dev".to_string());
            }
            args.extend(packages.iter().cloned());
            args
        }
        "poetry" => {
            let mut args = vec!["add".to_string()];
            if dev {
                args.push("--group=dev".to_string());
            }
            args.extend(packages.iter().cloned());
            args
        }
        _ => packages.to_vec(),
    }
}

pub struct InstallTool;

#[async_trait]
impl Tool for InstallTool {
    fn name(&self) -> &str {
        "install"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::Install(_) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["install tool received a non-install step".into()]));
        };
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::Install(payload) = &step.step.kind else {
            return Err(HypergenError::validation("install tool requires an install step"));
        };
        let result = StepResult::pending(&step.step.name, "install");

        let manager = match detect(&step.project_root, payload.package_manager.as_deref()) {
            Ok(m) => m,
            Err(e) if payload.optional => {
                tracing::warn!(error = %e, "optional install step skipped: no package manager detected");
                return Ok(StepResult {
                    tool_result: Some(ToolResult::Install {
                        package_manager: "none".into(),
                        installed: vec![],
                        skipped: true,
                    }),
                    ..result.finish(StepStatus::Skipped)
                });
            }
            Err(e) => return Err(e),
        };

        if which::which(manager.binary).is_err() {
            if payload.optional {
                return Ok(StepResult {
                    tool_result: Some(ToolResult::Install {
                        package_manager: manager.name.into(),
                        installed: vec![],
                        skipped: true,
                    }),
                    ..result.finish(StepStatus::Skipped)
                });
            }
            return Err(HypergenError::tool(
                "install",
                ToolErrorKind::Install,
                format!("package manager binary '{}' not found on PATH", manager.binary),
            ));
        }

        if options.dry_run || step.dry_run {
            return Ok(StepResult {
                tool_result: Some(ToolResult::Install {
                    package_manager: manager.name.into(),
                    installed: payload.packages.clone(),
                    skipped: false,
                }),
                ..result.finish(StepStatus::Completed)
            });
        }

        let args = install_args(manager, &payload.packages, payload.dev);
        let output = Command::new(manager.binary)
            .args(&args)
            .current_dir(&step.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| HypergenError::tool("install", ToolErrorKind::Install, format!("failed to run {}: {e}", manager.binary)))?;

        if !output.status.success() {
            if payload.optional {
                tracing::warn!(
                    manager = manager.name,
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "optional install step failed, continuing"
                );
                return Ok(StepResult {
                    tool_result: Some(ToolResult::Install {
                        package_manager: manager.name.into(),
                        installed: vec![],
                        skipped: true,
                    }),
                    ..result.finish(StepStatus::Skipped)
                });
            }
            return Err(HypergenError::tool(
                "install",
                ToolErrorKind::Install,
                format!("{} exited with {:?}: {}", manager.binary, output.status.code(), String::from_utf8_lossy(&output.stderr)),
            ));
        }

        Ok(StepResult {
            tool_result: Some(ToolResult::Install {
                package_manager: manager.name.into(),
                installed: payload.packages.clone(),
                skipped: false,
            }),
            ..result.finish(StepStatus::Completed)
        })
    }
}
