//! ABOUTME: Error types and handling for the Hypergen recipe engine
//! ABOUTME: Provides `HypergenError`, `ToolErrorKind`, and the crate-wide `Result` alias

use thiserror::Error;

/// Sub-classification of a `ToolExecution` failure, one variant per tool
/// family that can fail in a tool-specific way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    TemplateRender,
    FileWrite,
    Inject,
    CodeMod,
    Shell,
    Install,
    Query,
    Patch,
    /// A resolved path escaped its sandbox root (spec.md §5: path traversal).
    PathEscape,
    /// Unknown `tool:` discriminant, or a registry lookup miss.
    UnknownTool,
    Recipe,
    Prompt,
    EnsureDirs,
    Parallel,
    Ai,
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::TemplateRender => "template_render",
            Self::FileWrite => "file_write",
            Self::Inject => "inject",
            Self::CodeMod => "codemod",
            Self::Shell => "shell",
            Self::Install => "install",
            Self::Query => "query",
            Self::Patch => "patch",
            Self::PathEscape => "path_escape",
            Self::UnknownTool => "unknown_tool",
            Self::Recipe => "recipe",
            Self::Prompt => "prompt",
            Self::EnsureDirs => "ensure_dirs",
            Self::Parallel => "parallel",
            Self::Ai => "ai",
        };
        f.write_str(label)
    }
}

/// Comprehensive error enum for all Hypergen core operations.
///
/// Mirrors the taxonomy in the specification: each variant carries a
/// human-readable `message`, an optional `suggestion` for remediation, and
/// (where applicable) an underlying `cause`.
#[derive(Debug, Error)]
pub enum HypergenError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        suggestion: Option<String>,
    },

    #[error("Dependency error: {message}")]
    Dependency {
        message: String,
        suggestion: Option<String>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        suggestion: Option<String>,
    },

    #[error("Tool execution error ({kind}) in tool '{tool}': {message}")]
    ToolExecution {
        tool: String,
        kind: ToolErrorKind,
        message: String,
        #[source]
        cause: Option<Box<HypergenError>>,
        suggestion: Option<String>,
    },

    #[error("AI transport error: {message}")]
    AiTransport {
        message: String,
        #[source]
        cause: Option<anyhow::Error>,
    },

    #[error("Timeout after {elapsed_ms}ms (limit {limit_ms}ms) in step '{step}'")]
    Timeout {
        step: String,
        elapsed_ms: u64,
        limit_ms: u64,
    },

    #[error("Cancelled: {message}")]
    Cancelled { message: String },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        cause: Option<anyhow::Error>,
    },
}

impl HypergenError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            suggestion: None,
        }
    }

    pub fn tool(tool: impl Into<String>, kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            kind,
            message: message.into(),
            cause: None,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        let s = Some(suggestion.into());
        match &mut self {
            Self::Config { suggestion: x, .. }
            | Self::Dependency { suggestion: x, .. }
            | Self::Validation { suggestion: x, .. }
            | Self::ToolExecution { suggestion: x, .. } => *x = s,
            _ => {}
        }
        self
    }

    /// Whether the executor should consider retrying this failure, per the
    /// propagation policy in spec.md §7 (transient subprocess/transport
    /// failures are retriable; validation and config errors are not).
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::ToolExecution {
                kind: ToolErrorKind::Shell | ToolErrorKind::Install,
                ..
            } | Self::AiTransport { .. }
                | Self::Timeout { .. }
        )
    }
}

/// Convenience Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, HypergenError>;
