//! ABOUTME: Name-to-instance `Tool` Registry used by the Step Executor to resolve
//! ABOUTME: a step's `tool:` discriminant without knowing any concrete tool type

use std::collections::HashMap;
use std::sync::Arc;

use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::tool::Tool;

/// Maps a tool discriminant name (`"template"`, `"shell"`, ...) to a shared
/// instance. Each tool is constructed once and reused across every step that
/// names it, matching the "per-tool instance lifecycle" contract: a single
/// `initialize`/`cleanup` pair brackets every use of that tool in a run.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools.get(name).cloned().ok_or_else(|| {
            HypergenError::tool(
                name,
                ToolErrorKind::UnknownTool,
                format!("no tool registered for '{name}'"),
            )
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Run `initialize` on every registered tool. Call once before executing
    /// a recipe.
    pub async fn initialize_all(&self) -> Result<()> {
        for tool in self.tools.values() {
            tool.initialize().await?;
        }
        Ok(())
    }

    /// Run `cleanup` on every registered tool. Call once after a recipe run
    /// finishes, success or failure.
    pub async fn cleanup_all(&self) -> Result<()> {
        for tool in self.tools.values() {
            tool.cleanup().await?;
        }
        Ok(())
    }
}
