//! ABOUTME: `RecipeSource`, `EngineOptions`, and `RecipeExecution` — the engine's public contract
//! ABOUTME: (spec.md §4.11, §6). Lives in core so `hypergen-tools`'s Recipe tool can name them.

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::result::{ExecutionMetadata, StepResult};

/// Where a recipe document comes from. Resolving a bare recipe name to a
/// file path is a CLI/kit-discovery concern and out of scope here (spec.md
/// §1); callers of this core always hand in either a path or raw content.
#[derive(Debug, Clone)]
pub enum RecipeSource {
    File(PathBuf),
    Content { yaml: String, name: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Debug,
    Info,
    Warn,
    Error,
}

pub type OnMessageFn = Arc<dyn Fn(MessageLevel, &str) + Send + Sync>;
pub type OnStepResultFn = Arc<dyn Fn(&StepResult) + Send + Sync>;

/// Per-run options the CLI/host passes into `executeRecipe` (spec.md §6).
#[derive(Clone, Default)]
pub struct EngineOptions {
    pub variables: HashMap<String, Value>,
    pub working_dir: PathBuf,
    pub skip_prompts: bool,
    pub dry_run: bool,
    pub force: bool,
    pub answers: Option<HashMap<String, String>>,
    /// Explicit Pass-1/Pass-2 override. `None` lets the engine decide: Pass
    /// 1 (collect) when `answers` is absent, Pass 2 (resolve) when present.
    pub collect_mode: Option<bool>,
    pub on_message: Option<OnMessageFn>,
    pub on_step_result: Option<OnStepResultFn>,
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("variables", &self.variables)
            .field("working_dir", &self.working_dir)
            .field("skip_prompts", &self.skip_prompts)
            .field("dry_run", &self.dry_run)
            .field("force", &self.force)
            .field("answers", &self.answers)
            .field("collect_mode", &self.collect_mode)
            .finish_non_exhaustive()
    }
}

/// The engine's top-level, always-returned result (spec.md §7: "must not
/// throw through the public boundary").
#[derive(Debug, Clone)]
pub struct RecipeExecution {
    pub recipe_name: String,
    pub success: bool,
    pub step_results: Vec<StepResult>,
    pub metadata: ExecutionMetadata,
    /// Values named in the recipe's `provides:` (spec.md §3), visible to a
    /// parent recipe invoking this one via the Recipe tool.
    pub provides: HashMap<String, Value>,
    pub rendered_message: Option<String>,
    /// Deferred AI resolution: present when a Pass-1 run produced an
    /// assembled prompt the caller must resolve out-of-band (stdout
    /// transport), per spec.md §4.8.
    pub deferred_prompt: Option<String>,
    pub error: Option<String>,
}

impl RecipeExecution {
    pub fn is_deferred(&self) -> bool {
        self.deferred_prompt.is_some()
    }
}
