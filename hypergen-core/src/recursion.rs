//! ABOUTME: Callback traits that let Sequence/Parallel/Recipe tools re-enter the executor
//! ABOUTME: without `hypergen-tools` depending on `hypergen-engine` (avoids a cycle)

use async_trait::async_trait;
use std::sync::Arc;

use crate::context::StepContext;
use crate::error::Result;
use crate::execution::{EngineOptions, RecipeExecution, RecipeSource};
use crate::result::StepResult;
use crate::step::Step;

/// Re-enters the Step Executor for one child `Step`, given the parent's
/// context. Implemented by `hypergen-engine`'s executor; injected into the
/// Sequence and Parallel tools at registration time so those tools stay in
/// `hypergen-tools` without a dependency back on the engine crate.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run_step(&self, step: &Step, parent: &StepContext) -> Result<StepResult>;
}

/// Re-enters the Recipe Engine for a nested recipe (spec.md §4.5). Also
/// implemented by `hypergen-engine`, which owns the cycle guard keyed by
/// `(recipe identity, variable fingerprint)`.
#[async_trait]
pub trait RecipeRunner: Send + Sync {
    async fn run_recipe(&self, source: RecipeSource, options: EngineOptions) -> Result<RecipeExecution>;
}

pub type SharedStepRunner = Arc<dyn StepRunner>;
pub type SharedRecipeRunner = Arc<dyn RecipeRunner>;
