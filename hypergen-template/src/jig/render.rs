//! ABOUTME: Interprets the Jig node tree against a `RenderState`, branching `@ai`/`@context`/
//! ABOUTME: `@prompt`/`@output`/`@example` on `collect_mode` per spec.md §4.8's two-pass protocol.

use serde_json::Value;
use std::collections::HashMap;

use hypergen_core::condition::{eval, NoopHelpers};
use hypergen_core::Variables;

use super::ast::Node;
use crate::ai::collector::AiBlockEntry;
use crate::engine::{RenderState, TemplateError};

/// Render a parsed node list against `state`, mutating `state.variables` as
/// `@ai` blocks bind `state[key]` for downstream references (spec.md §4.8).
pub fn render(nodes: &[Node], state: &mut RenderState) -> Result<String, TemplateError> {
    render_nodes(nodes, state, None)
}

fn render_nodes(
    nodes: &[Node],
    state: &mut RenderState,
    mut ai_builder: Option<&mut AiBlockEntry>,
) -> Result<String, TemplateError> {
    let mut out = String::new();
    for node in nodes {
        out.push_str(&render_node(node, state, ai_builder.as_deref_mut())?);
    }
    Ok(out)
}

fn render_node(
    node: &Node,
    state: &mut RenderState,
    ai_builder: Option<&mut AiBlockEntry>,
) -> Result<String, TemplateError> {
    match node {
        Node::Text(t) => Ok(t.clone()),
        Node::Interp(expr) => Ok(eval_display(expr, state)),
        Node::Tag { name, args, children } => render_tag(name, args, children, state, ai_builder),
    }
}

fn render_tag(
    name: &str,
    args: &Value,
    children: &[Node],
    state: &mut RenderState,
    ai_builder: Option<&mut AiBlockEntry>,
) -> Result<String, TemplateError> {
    match name {
        "ai" => render_ai(args, children, state),
        "context" => render_context(children, state, ai_builder),
        "prompt" => render_prompt(children, state, ai_builder),
        "output" => render_output(args, children, state, ai_builder),
        "example" => render_example(children, state, ai_builder),
        other => Err(TemplateError::Render(format!(
            "unknown tag '@{other}' (no built-in handler and no registered extension)"
        ))),
    }
}

/// `@ai({ key: '...' })` or `@ai('...')`. See spec.md §4.8.
fn render_ai(args: &Value, children: &[Node], state: &mut RenderState) -> Result<String, TemplateError> {
    let key = extract_key(args)?;

    if state.collect_mode {
        let mut entry = AiBlockEntry {
            key: key.clone(),
            source_file: state.source_file.clone(),
            ..Default::default()
        };
        // Pass 1: run children as a collection side-effect; their own output
        // is discarded (they only ever emit empty strings themselves).
        render_nodes(children, state, Some(&mut entry))?;
        state.collector.add_entry(entry.clone());

        let bound = entry
            .examples
            .first()
            .cloned()
            .unwrap_or_else(|| entry.output_description.trim().to_string());
        state.set(key, Value::String(bound));
        Ok(String::new())
    } else {
        // Pass 2: children are NOT executed, so Pass-1-only variables can't
        // cause a render error here.
        let answer = state
            .answers
            .and_then(|a| a.get(&key))
            .cloned()
            .unwrap_or_default();
        state.set(key, Value::String(answer.clone()));
        Ok(answer)
    }
}

fn extract_key(args: &Value) -> Result<String, TemplateError> {
    match args {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => map
            .get("key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TemplateError::Parse("@ai(...) requires a 'key'".into())),
        _ => Err(TemplateError::Parse(
            "@ai(...) requires a bare string or an object with 'key'".into(),
        )),
    }
}

/// `@context(...)`. Inside an `@ai` block, contributes to that block's local
/// contexts; free-standing, contributes to the collector's global context.
/// Only has an effect during Pass 1 — by Pass 2 the collector has already
/// been assembled into a prompt, so there is nothing left to contribute to.
fn render_context(
    children: &[Node],
    state: &mut RenderState,
    ai_builder: Option<&mut AiBlockEntry>,
) -> Result<String, TemplateError> {
    if !state.collect_mode {
        return Ok(String::new());
    }
    let text = render_nodes(children, state, None)?.trim().to_string();
    match ai_builder {
        Some(entry) => entry.contexts.push(text),
        None => state.collector.add_global_context(text),
    }
    Ok(String::new())
}

/// `@prompt(...)`, valid only nested inside `@ai`.
fn render_prompt(
    children: &[Node],
    state: &mut RenderState,
    ai_builder: Option<&mut AiBlockEntry>,
) -> Result<String, TemplateError> {
    if !state.collect_mode {
        return Ok(String::new());
    }
    let text = render_nodes(children, state, None)?.trim().to_string();
    if let Some(entry) = ai_builder {
        entry.prompt = text;
    }
    Ok(String::new())
}

/// `@output({ typeHint?: ... })`, valid only nested inside `@ai`. Its
/// children are free-form output-spec text interleaved with `@example`
/// blocks, which are collected separately rather than folded into the
/// description.
fn render_output(
    args: &Value,
    children: &[Node],
    state: &mut RenderState,
    ai_builder: Option<&mut AiBlockEntry>,
) -> Result<String, TemplateError> {
    if !state.collect_mode {
        return Ok(String::new());
    }
    let Some(entry) = ai_builder else {
        return Ok(String::new());
    };

    if let Some(hint) = args.get("typeHint").and_then(Value::as_str) {
        entry.type_hint = Some(hint.to_string());
    }

    let mut description = String::new();
    for child in children {
        if let Node::Tag { name, children: ex_children, .. } = child {
            if name == "example" {
                let text = render_nodes(ex_children, state, None)?.trim().to_string();
                entry.examples.push(text);
                continue;
            }
        }
        description.push_str(&render_node(child, state, None)?);
    }
    entry.output_description = description;
    Ok(String::new())
}

/// `@example(...)` outside of `@output` (e.g. directly nested in `@ai`) is
/// tolerated and still recorded, for templates that skip the `@output`
/// wrapper.
fn render_example(
    children: &[Node],
    state: &mut RenderState,
    ai_builder: Option<&mut AiBlockEntry>,
) -> Result<String, TemplateError> {
    if !state.collect_mode {
        return Ok(String::new());
    }
    let text = render_nodes(children, state, None)?.trim().to_string();
    if let Some(entry) = ai_builder {
        entry.examples.push(text);
    }
    Ok(String::new())
}

/// Evaluate a `{{ expr }}` interpolation against the render-time variable
/// bag. A bare call to a name in the engine's global-function registry
/// (e.g. `slugify('My Title')`) is dispatched there; otherwise the
/// expression runs through the same condition-expression sandbox the
/// executor uses for `when`/`exports` (spec.md §6: "Template-style
/// expressions ... are evaluated by the template engine against the same
/// bag").
fn eval_display(expr: &str, state: &RenderState) -> String {
    if let Some(value) = try_call_global(expr, state) {
        return value_to_display(&value);
    }

    let vars: Variables = state
        .variables
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<HashMap<_, _>>()
        .into();
    match eval(expr, &vars, &NoopHelpers) {
        Ok(value) => value_to_display(&value),
        Err(_) => String::new(),
    }
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string().trim_matches('"').to_string(),
    }
}

fn try_call_global(expr: &str, state: &RenderState) -> Option<Value> {
    let expr = expr.trim();
    let open = expr.find('(')?;
    if !expr.ends_with(')') {
        return None;
    }
    let name = expr[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let f = state.globals.get(name)?;
    let args = super::args::parse_value_list(&expr[open + 1..expr.len() - 1]).ok()?;
    Some(f(&args))
}
