//! ABOUTME: The Step Executor, Recipe Engine, and Automatic Template Processing pass —
//! ABOUTME: the orchestration layer that ties `hypergen-core`, `hypergen-template`, and
//! ABOUTME: `hypergen-tools` together into a runnable recipe engine (spec.md §4.10-§4.12, §6).

pub mod backoff;
pub mod config;
pub mod engine;
pub mod executor;
pub mod output_evaluator;
pub mod planner;
pub mod template_processing;

pub use backoff::{BackoffStrategy, JitterStrategy, RetryPolicy};
pub use config::{EngineConfig, JitterConfig, RetryConfig};
pub use engine::RecipeEngine;
pub use executor::StepExecutor;
