//! ABOUTME: The Template Engine Adapter contract every concrete engine implements
//! ABOUTME: Exposes a tag-extension API and a global-function registry, abstract over the
//! ABOUTME: default "Jig" engine so alternate engines can be swapped in.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ai::collector::AiCollector;

#[derive(Debug, Clone)]
pub enum TemplateError {
    Parse(String),
    Render(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(m) => write!(f, "template parse error: {m}"),
            Self::Render(m) => write!(f, "template render error: {m}"),
        }
    }
}

impl std::error::Error for TemplateError {}

pub type GlobalFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Render-time state shared by every tag handler and the `{{ expr }}`
/// interpolator. Owns nothing about the filesystem — that's the Template
/// tool's job.
pub struct RenderState<'a> {
    pub variables: HashMap<String, Value>,
    pub collect_mode: bool,
    pub answers: Option<&'a HashMap<String, String>>,
    pub collector: Arc<AiCollector>,
    pub source_file: String,
    pub globals: &'a HashMap<String, GlobalFn>,
}

impl<'a> RenderState<'a> {
    pub fn get(&self, name: &str) -> Value {
        self.variables.get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }
}

/// Adapter contract: render a template string plus a JSON context to text.
/// A concrete engine also exposes a tag-extension API (custom block tags)
/// and a global-function registry (callable from `{{ expr }}`), per
/// spec.md §2.
pub trait TemplateEngine: Send + Sync {
    fn name(&self) -> &str;

    fn render(
        &self,
        template: &str,
        context: &Value,
        collect_mode: bool,
        answers: Option<&HashMap<String, String>>,
        source_file: &str,
    ) -> Result<String, TemplateError>;

    /// Register a global function callable as `fnName(args...)` inside
    /// `{{ }}` interpolations.
    fn register_function(&mut self, name: &str, f: GlobalFn);
}
