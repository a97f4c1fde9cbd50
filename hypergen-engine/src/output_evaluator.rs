//! ABOUTME: Output Evaluator: turns a step's `exports:` map into merged variable values
//! ABOUTME: Template-style expressions route through the template engine; everything else
//! ABOUTME: through the condition sandbox (spec.md §4.9)

use std::collections::HashMap;

use serde_json::Value;

use hypergen_core::condition::{eval_export, ConditionHelpers};
use hypergen_core::result::ToolResult;
use hypergen_core::variables::Variables;
use hypergen_template::engine::TemplateEngine;

fn is_template_expression(expr: &str) -> bool {
    expr.contains("{{") || expr.contains('@')
}

fn tool_result_as_value(tool_result: Option<&ToolResult>) -> Value {
    match tool_result {
        Some(result) => serde_json::to_value(result).unwrap_or(Value::Null),
        None => Value::Object(serde_json::Map::new()),
    }
}

/// Build the `{result, step, status, ...variables}` bag an export
/// expression evaluates against. `variables` entries win over the three
/// synthetic keys on collision, matching object-spread order in §4.9.
fn export_context(
    step_name: &str,
    status: &str,
    tool_result: Option<&ToolResult>,
    variables: &Variables,
) -> Variables {
    let mut ctx = Variables::new();
    ctx.insert("result", tool_result_as_value(tool_result));
    ctx.insert("step", Value::String(step_name.to_string()));
    ctx.insert("status", Value::String(status.to_string()));
    ctx.merge_from(variables);
    ctx
}

/// Evaluate every `(name, expression)` pair in `exports`, skipping (not
/// aborting on) any expression that errors, per spec.md §4.9 and §7:
/// "any thrown error yields `undefined` for that key; other exports
/// proceed."
pub fn evaluate_exports(
    exports: &HashMap<String, String>,
    step_name: &str,
    status: &str,
    tool_result: Option<&ToolResult>,
    variables: &Variables,
    helpers: &dyn ConditionHelpers,
    template_engine: &dyn TemplateEngine,
) -> HashMap<String, Value> {
    if exports.is_empty() {
        return HashMap::new();
    }

    let ctx = export_context(step_name, status, tool_result, variables);
    let ctx_json = ctx.to_json_object();

    let mut out = HashMap::new();
    for (name, expr) in exports {
        let value = if is_template_expression(expr) {
            template_engine
                .render(expr, &ctx_json, false, None, "<exports>")
                .ok()
                .map(|rendered| Value::String(rendered.trim().to_string()))
        } else {
            eval_export(expr, &ctx, helpers)
        };

        if let Some(value) = value {
            out.insert(name.clone(), value);
        }
    }
    out
}
