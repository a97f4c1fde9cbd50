//! ABOUTME: The default "Jig" template engine: `@tag(...) ... @end` blocks plus
//! ABOUTME: `{{ expr }}` interpolation, implementing the `TemplateEngine` adapter contract.

pub mod args;
pub mod ast;
pub mod lexer;
pub mod render;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::ai::collector::AiCollector;
use crate::engine::{GlobalFn, RenderState, TemplateEngine, TemplateError};

/// The default concrete `TemplateEngine`: a small `@tag(...) … @end` block
/// language with `{{ expr }}` interpolation (spec.md §2).
pub struct JigEngine {
    globals: HashMap<String, GlobalFn>,
    collector: Arc<AiCollector>,
}

impl JigEngine {
    pub fn new() -> Self {
        Self {
            globals: HashMap::new(),
            collector: AiCollector::global(),
        }
    }

    /// Use an explicit collector handle instead of the process-global
    /// singleton, for isolated/concurrent runs (spec.md §5's per-run
    /// scoping alternative).
    pub fn with_collector(collector: Arc<AiCollector>) -> Self {
        Self {
            globals: HashMap::new(),
            collector,
        }
    }
}

impl Default for JigEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for JigEngine {
    fn name(&self) -> &str {
        "jig"
    }

    fn render(
        &self,
        template: &str,
        context: &Value,
        collect_mode: bool,
        answers: Option<&HashMap<String, String>>,
        source_file: &str,
    ) -> Result<String, TemplateError> {
        let nodes = ast::parse(template)?;
        let variables = context
            .as_object()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let mut state = RenderState {
            variables,
            collect_mode,
            answers,
            collector: self.collector.clone(),
            source_file: source_file.to_string(),
            globals: &self.globals,
        };
        render::render(&nodes, &mut state)
    }

    fn register_function(&mut self, name: &str, f: GlobalFn) {
        self.globals.insert(name.to_string(), f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::collector::AiCollector;
    use serde_json::json;

    fn fresh_engine() -> JigEngine {
        JigEngine::with_collector(Arc::new(AiCollector::new()))
    }

    #[test]
    fn interpolates_variables() {
        let engine = fresh_engine();
        let out = engine
            .render("Hello {{ name }}!", &json!({ "name": "world" }), false, None, "t.jig")
            .unwrap();
        assert_eq!(out, "Hello world!");
    }

    #[test]
    fn pass1_collects_ai_block_and_emits_no_output() {
        let engine = fresh_engine();
        let template = "@ai({ key: 'body' }) @prompt() hi @end @output() @example() X @end @end @end";
        let out = engine.render(template, &json!({}), true, None, "t.jig").unwrap();
        assert_eq!(out.trim(), "");
        let entries = engine.collector.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "body");
        assert_eq!(entries[0].prompt, "hi");
        assert_eq!(entries[0].examples, vec!["X".to_string()]);
    }

    #[test]
    fn pass2_resolves_from_answers_without_executing_children() {
        let engine = fresh_engine();
        let template = "@ai({ key: 'body' }) @prompt() {{ undefinedVar.nope }} @end @end";
        let mut answers = HashMap::new();
        answers.insert("body".to_string(), "OK".to_string());
        let out = engine
            .render(template, &json!({}), false, Some(&answers), "t.jig")
            .unwrap();
        assert_eq!(out, "OK");
    }

    #[test]
    fn two_pass_fidelity_has_no_leftover_tag_syntax() {
        let engine = fresh_engine();
        let template = "before @ai('k') @prompt() hi @end @end after";
        let pass1 = engine.render(template, &json!({}), true, None, "t.jig").unwrap();
        assert!(!pass1.contains("@ai("));
        assert!(!pass1.contains("undefined"));

        let mut answers = HashMap::new();
        answers.insert("k".to_string(), "RESULT".to_string());
        let pass2 = engine
            .render(template, &json!({}), false, Some(&answers), "t.jig")
            .unwrap();
        assert_eq!(pass2.trim(), "before RESULT after");
        assert!(!pass2.contains("{{"));
        assert!(!pass2.contains("@prompt("));
    }

    #[test]
    fn free_standing_context_contributes_to_global_contexts() {
        let engine = fresh_engine();
        let template = "@context() shared background @end";
        engine.render(template, &json!({}), true, None, "t.jig").unwrap();
        assert_eq!(engine.collector.global_contexts(), vec!["shared background".to_string()]);
    }
}
