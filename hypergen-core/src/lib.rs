//! ABOUTME: Data model, error taxonomy, condition sandbox, and tool contract
//! ABOUTME: for the Hypergen recipe engine. Foundation layer shared by every other crate.

pub mod condition;
pub mod context;
pub mod error;
pub mod execution;
pub mod recipe;
pub mod recursion;
pub mod result;
pub mod step;
pub mod tool;
pub mod variables;

pub use condition::{eval, eval_export, eval_when, ConditionHelpers};
pub use context::{FsConditionHelpers, RecipeIdentity, StepContext};
pub use error::{HypergenError, Result, ToolErrorKind};
pub use execution::{
    EngineOptions, MessageLevel, OnMessageFn, OnStepResultFn, RecipeExecution, RecipeSource,
};
pub use recipe::{Recipe, RecipeComposition, RecipeHooks, RecipeSteps, VariableSpec};
pub use recursion::{RecipeRunner, SharedRecipeRunner, SharedStepRunner, StepRunner};
pub use result::{
    AiResolutionStatus, ExecutionContextInfo, ExecutionMetadata, SkipReason, StepResult,
    StepStatus, ToolResult,
};
pub use step::{
    ActionStep, AiGuardrails, AiStep, CodeModStep, EnsureDirsStep, InstallStep, ParallelStep,
    PatchStep, PromptStep, QueryStep, RecipeStepPayload, SequenceStep, ShellStep, Step, StepKind,
    TemplateStep,
};
pub use tool::{ExecuteOptions, ResourceRequirements, Tool, ValidationResult};
pub use variables::Variables;
