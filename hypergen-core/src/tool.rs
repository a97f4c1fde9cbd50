//! ABOUTME: The `Tool` contract every Template/Action/CodeMod/... implementation satisfies
//! ABOUTME: Open set registered by name; the executor never knows about concrete tool types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::StepContext;
use crate::error::Result;
use crate::result::StepResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub network: bool,
    pub subprocess: bool,
    pub filesystem_write: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub estimated_execution_time_ms: Option<u64>,
    pub resource_requirements: Option<ResourceRequirements>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub dry_run: bool,
    pub force: bool,
}

/// Uniform contract implemented by every tool kind (spec.md §4.1).
///
/// Tools are pure with respect to inputs beyond their declared I/O
/// (filesystem, subprocess, or the AI transport's network access).
/// `execute` must never throw through the top boundary — failures are
/// represented as a failed [`StepResult`] or a typed [`crate::error::HypergenError`],
/// never a panic.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool discriminant name, matching the `tool:` field of a `Step`.
    fn name(&self) -> &str;

    /// Optional, idempotent setup invoked once per tool instance lifetime.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Pre-execution validation: parameter schema checks, missing-file
    /// checks, and anything else cheap enough to run before committing to
    /// `execute`.
    async fn validate(&self, step: &StepContext) -> Result<ValidationResult>;

    /// Execute the step, returning a fully populated [`StepResult`].
    /// Retriable failures should be represented via
    /// [`crate::error::HypergenError::is_retriable`] so the executor can
    /// retry per spec.md §4.10.
    async fn execute(&self, step: &StepContext, options: ExecuteOptions) -> Result<StepResult>;

    /// Optional teardown invoked once per tool instance lifetime.
    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}
