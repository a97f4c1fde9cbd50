//! ABOUTME: `StepContext`, the per-step read-mostly record owned by the executor
//! ABOUTME: Tools never retain it past their own `execute` call

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::condition::ConditionHelpers;
use crate::result::StepResult;
use crate::step::Step;
use crate::variables::Variables;

/// Real-filesystem implementation of [`ConditionHelpers`], resolving paths
/// relative to `project_root`.
pub struct FsConditionHelpers {
    pub project_root: PathBuf,
}

impl ConditionHelpers for FsConditionHelpers {
    fn file_exists(&self, path: &str) -> bool {
        self.project_root.join(path).is_file()
    }

    fn dir_exists(&self, path: &str) -> bool {
        self.project_root.join(path).is_dir()
    }
}

/// Identity of the recipe currently executing, used by the Recipe tool's
/// cycle guard (spec.md §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecipeIdentity {
    pub recipe_id: String,
    pub variable_fingerprint: String,
}

/// Per-step, read-mostly execution context. Owned transiently by the
/// [`crate::tool::Tool`] executor for the duration of one step's
/// `validate`/`execute` call.
pub struct StepContext {
    pub step: Step,
    pub variables: Variables,
    pub project_root: PathBuf,
    pub prior_results: HashMap<String, StepResult>,
    pub recipe_identity: RecipeIdentity,
    pub condition_helpers: Arc<dyn ConditionHelpers + Send + Sync>,
    /// Pass-2 AI answers, present only when resolving a deferred run.
    pub answers: Option<HashMap<String, String>>,
    /// Pass-1 collection flag for AI blocks.
    pub collect_mode: bool,
    pub dry_run: bool,
    pub force: bool,
    pub skip_prompts: bool,
}

impl StepContext {
    pub fn new(
        step: Step,
        variables: Variables,
        project_root: PathBuf,
        recipe_identity: RecipeIdentity,
    ) -> Self {
        let condition_helpers: Arc<dyn ConditionHelpers + Send + Sync> =
            Arc::new(FsConditionHelpers {
                project_root: project_root.clone(),
            });
        Self {
            step,
            variables,
            project_root,
            prior_results: HashMap::new(),
            recipe_identity,
            condition_helpers,
            answers: None,
            collect_mode: false,
            dry_run: false,
            force: false,
            skip_prompts: false,
        }
    }

    pub fn resolve_path(&self, relative_or_absolute: &str) -> PathBuf {
        let path = PathBuf::from(relative_or_absolute);
        if path.is_absolute() {
            path
        } else {
            self.project_root.join(path)
        }
    }
}
