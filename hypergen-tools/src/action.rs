//! ABOUTME: The Action tool: invokes a registered named function against a typed,
//! ABOUTME: coerced parameter set (spec.md §4.3)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::result::{StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

/// Declared parameter types an action can require, per spec.md §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Enum,
    Array,
    Object,
    File,
    Directory,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    /// Allowed values for `ParamType::Enum`.
    pub allowed: Vec<String>,
    /// Optional regex the coerced string form must match.
    pub pattern: Option<String>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            default: None,
            allowed: vec![],
            pattern: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, default: Value) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default: Some(default),
            allowed: vec![],
            pattern: None,
        }
    }
}

/// Metadata describing a registered action, per spec.md §4.3.
#[derive(Debug, Clone, Default)]
pub struct ActionMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

/// Read/write channel scoped to one recipe run, shared by every Action
/// invocation within it (spec.md §4.3's "a `communication` channel").
#[derive(Default)]
pub struct Communication {
    shared: parking_lot::Mutex<HashMap<String, Value>>,
}

impl Communication {
    pub fn get_shared_data(&self, key: &str) -> Option<Value> {
        self.shared.lock().get(key).cloned()
    }

    pub fn set_shared_data(&self, key: impl Into<String>, value: Value) {
        self.shared.lock().insert(key.into(), value);
    }
}

/// The context handed to an action's function body: coerced parameters, the
/// step's variable bag, `dryRun`/`force`, and the communication channel.
pub struct ActionContext<'a> {
    pub parameters: HashMap<String, Value>,
    pub step: &'a StepContext,
    pub communication: Arc<Communication>,
    pub dry_run: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub files_created: Vec<String>,
    pub files_modified: Vec<String>,
    pub files_deleted: Vec<String>,
    pub data: Option<Value>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}

pub type ActionFn = Arc<dyn Fn(ActionContext<'_>) -> Result<ActionResult> + Send + Sync>;

struct RegisteredAction {
    metadata: ActionMetadata,
    func: ActionFn,
}

/// Name→function registry of actions, resolved by the Action tool from each
/// step's `action:` field.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, RegisteredAction>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metadata: ActionMetadata, func: ActionFn) {
        self.actions.insert(metadata.name.clone(), RegisteredAction { metadata, func });
    }

    pub fn metadata(&self, name: &str) -> Option<&ActionMetadata> {
        self.actions.get(name).map(|a| &a.metadata)
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    /// Invoke a registered action directly, bypassing the Action tool's
    /// `Step`/`StepContext` plumbing. Used by the Recipe Engine to run
    /// `beforeRecipe`/`afterRecipe`/`beforeStep`/`afterStep`/`onError` hook
    /// actions, which are named by the recipe but aren't steps themselves
    /// (spec.md §3's `hooks`).
    pub fn invoke(&self, name: &str, ctx: ActionContext<'_>) -> Result<ActionResult> {
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| HypergenError::tool("action", ToolErrorKind::UnknownTool, format!("unknown hook action '{name}'")))?;
        (action.func)(ctx)
    }
}

/// Coerce `raw` into the declared `param_type`, applying `default` when
/// absent and validating `pattern`/`allowed` (spec.md §4.3).
fn coerce(spec: &ParamSpec, raw: Option<&Value>) -> Result<Value> {
    let value = match raw {
        Some(v) => v.clone(),
        None => match &spec.default {
            Some(d) => d.clone(),
            None if spec.required => {
                return Err(HypergenError::validation(format!(
                    "missing required parameter '{}'",
                    spec.name
                )))
            }
            None => Value::Null,
        },
    };

    let coerced = match spec.param_type {
        ParamType::String | ParamType::File | ParamType::Directory => match &value {
            Value::String(_) => value,
            Value::Null => value,
            other => Value::String(other.to_string()),
        },
        ParamType::Number => match &value {
            Value::Number(_) => value,
            Value::String(s) => s.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number).ok_or_else(|| {
                HypergenError::validation(format!("parameter '{}' is not a valid number", spec.name))
            })?,
            _ => {
                return Err(HypergenError::validation(format!(
                    "parameter '{}' must be a number",
                    spec.name
                )))
            }
        },
        ParamType::Boolean => match &value {
            Value::Bool(_) => value,
            Value::String(s) => Value::Bool(s == "true" || s == "1"),
            _ => {
                return Err(HypergenError::validation(format!(
                    "parameter '{}' must be a boolean",
                    spec.name
                )))
            }
        },
        ParamType::Array => match &value {
            Value::Array(_) => value,
            _ => {
                return Err(HypergenError::validation(format!(
                    "parameter '{}' must be an array",
                    spec.name
                )))
            }
        },
        ParamType::Object => match &value {
            Value::Object(_) => value,
            _ => {
                return Err(HypergenError::validation(format!(
                    "parameter '{}' must be an object",
                    spec.name
                )))
            }
        },
        ParamType::Enum => match &value {
            Value::String(s) if spec.allowed.is_empty() || spec.allowed.iter().any(|a| a == s) => value.clone(),
            Value::String(s) => {
                return Err(HypergenError::validation(format!(
                    "parameter '{}' value '{s}' is not one of {:?}",
                    spec.name, spec.allowed
                )))
            }
            _ => {
                return Err(HypergenError::validation(format!(
                    "parameter '{}' must be a string enum value",
                    spec.name
                )))
            }
        },
    };

    if let (Some(pattern), Value::String(s)) = (&spec.pattern, &coerced) {
        let re = regex::Regex::new(pattern)
            .map_err(|e| HypergenError::validation(format!("invalid pattern for '{}': {e}", spec.name)))?;
        if !re.is_match(s) {
            return Err(HypergenError::validation(format!(
                "parameter '{}' value '{s}' does not match pattern {pattern}",
                spec.name
            )));
        }
    }

    Ok(coerced)
}

pub struct ActionTool {
    registry: Arc<ActionRegistry>,
    communication: Arc<Communication>,
}

impl ActionTool {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            communication: Arc::new(Communication::default()),
        }
    }
}

#[async_trait]
impl Tool for ActionTool {
    fn name(&self) -> &str {
        "action"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::Action(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec!["action tool received a non-action step".into()]));
        };
        let Some(metadata) = self.registry.metadata(&payload.action) else {
            return Ok(ValidationResult::invalid(vec![format!("unknown action '{}'", payload.action)]));
        };
        let mut errors = Vec::new();
        for spec in &metadata.parameters {
            if let Err(e) = coerce(spec, payload.parameters.get(&spec.name)) {
                errors.push(e.to_string());
            }
        }
        if errors.is_empty() {
            Ok(ValidationResult::ok())
        } else {
            Ok(ValidationResult::invalid(errors))
        }
    }

    async fn execute(&self, step: &StepContext, options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::Action(payload) = &step.step.kind else {
            return Err(HypergenError::validation("action tool requires an action step"));
        };
        let result = StepResult::pending(&step.step.name, "action");

        let action = self.registry.actions.get(&payload.action).ok_or_else(|| {
            HypergenError::tool("action", ToolErrorKind::UnknownTool, format!("unknown action '{}'", payload.action))
        })?;

        let mut parameters = HashMap::new();
        for spec in &action.metadata.parameters {
            parameters.insert(spec.name.clone(), coerce(spec, payload.parameters.get(&spec.name))?);
        }

        let ctx = ActionContext {
            parameters,
            step,
            communication: self.communication.clone(),
            dry_run: payload.dry_run.unwrap_or(options.dry_run || step.dry_run),
            force: payload.force.unwrap_or(options.force || step.force),
        };

        let outcome = (action.func)(ctx)?;

        let status = if outcome.success {
            StepStatus::Completed
        } else if step.step.continue_on_error {
            StepStatus::Failed
        } else {
            return Err(HypergenError::tool("action", ToolErrorKind::FileWrite, outcome.message));
        };

        Ok(StepResult {
            files_created: outcome.files_created.clone(),
            files_modified: outcome.files_modified.clone(),
            files_deleted: outcome.files_deleted.clone(),
            error: if outcome.success { None } else { Some(outcome.message.clone()) },
            tool_result: Some(ToolResult::Action {
                success: outcome.success,
                message: outcome.message,
                files_created: outcome.files_created,
                files_modified: outcome.files_modified,
                files_deleted: outcome.files_deleted,
                data: outcome.data,
            }),
            ..result.finish(status)
        })
    }
}
