//! ABOUTME: Deterministically serializes the AI Collector into one Markdown prompt + JSON schema
//! ABOUTME: Pure function of Collector state and the invocation hint (spec.md §8 round-trip law)

use super::collector::AiBlockEntry;
use serde_json::{json, Value};

/// The assembled prompt and its companion JSON response schema.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub markdown: String,
    pub schema: Value,
}

/// Build the Markdown prompt + response schema from the entries collected
/// during Pass 1, plus any free-standing global contexts.
///
/// `answers_hint` is the path the assembler tells the caller to re-invoke
/// with (e.g. `--answers <path>`); it is not itself a filesystem path this
/// function touches.
pub fn assemble(entries: &[AiBlockEntry], global_contexts: &[String], answers_hint: &str) -> AssembledPrompt {
    let mut md = String::new();
    md.push_str("# Hypergen AI Generation Request\n\n");

    if !global_contexts.is_empty() {
        md.push_str("## Context\n\n");
        for ctx in global_contexts {
            md.push_str(ctx.trim());
            md.push_str("\n\n");
        }
    }

    md.push_str("## Prompts\n\n");
    for entry in entries {
        md.push_str(&format!("### `{}`\n\n", entry.key));

        if !entry.contexts.is_empty() {
            md.push_str("**Context:**\n\n");
            for ctx in &entry.contexts {
                md.push_str("```\n");
                md.push_str(ctx.trim());
                md.push_str("\n```\n\n");
            }
        }

        md.push_str("**Prompt:**\n\n");
        md.push_str(entry.prompt.trim());
        md.push_str("\n\n");

        md.push_str("**Expected output:**\n\n");
        if let Some(hint) = &entry.type_hint {
            md.push_str(&format!("Type: `{hint}`\n\n"));
        }
        md.push_str(entry.output_description.trim());
        md.push('\n');

        if !entry.examples.is_empty() {
            md.push_str("\n**Examples:**\n\n");
            for example in &entry.examples {
                md.push_str("```\n");
                md.push_str(example.trim());
                md.push_str("\n```\n\n");
            }
        }

        md.push('\n');
    }

    md.push_str("## Response Format\n\n");
    md.push_str("Respond with a single JSON object keyed by every prompt above:\n\n");
    md.push_str("```json\n");
    md.push_str(&format!(
        "{}\n",
        serde_json::to_string_pretty(&example_response_object(entries)).unwrap_or_default()
    ));
    md.push_str("```\n\n");
    md.push_str(&format!(
        "Save your response and re-run with --answers {answers_hint}\n"
    ));

    AssembledPrompt {
        markdown: md,
        schema: response_schema(entries),
    }
}

fn example_response_object(entries: &[AiBlockEntry]) -> Value {
    let mut map = serde_json::Map::new();
    for entry in entries {
        map.insert(entry.key.clone(), json!("..."));
    }
    Value::Object(map)
}

/// A JSON Schema requiring every collected key to be present as a string
/// property, in collector order (stable given a stable collector — see
/// [`super::collector::AiCollector`]).
fn response_schema(entries: &[AiBlockEntry]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for entry in entries {
        properties.insert(entry.key.clone(), json!({ "type": "string" }));
        required.push(entry.key.clone());
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str) -> AiBlockEntry {
        AiBlockEntry {
            key: key.into(),
            contexts: vec![],
            prompt: format!("do {key}"),
            output_description: "text".into(),
            type_hint: None,
            examples: vec![],
            source_file: "t.jig".into(),
        }
    }

    #[test]
    fn prompt_contains_header_and_one_subsection_per_key() {
        let entries = vec![entry("handlerBody"), entry("formFields")];
        let assembled = assemble(&entries, &[], "answers.json");
        assert!(assembled.markdown.starts_with("# Hypergen AI Generation Request"));
        assert!(assembled.markdown.contains("### `handlerBody`"));
        assert!(assembled.markdown.contains("### `formFields`"));
        assert!(assembled.markdown.contains("--answers answers.json"));
    }

    #[test]
    fn schema_mentions_every_collected_key() {
        let entries = vec![entry("a"), entry("b")];
        let assembled = assemble(&entries, &[], "a.json");
        let required = assembled.schema["required"].as_array().unwrap();
        let keys: Vec<&str> = required.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn assembler_output_is_a_pure_function_of_collector_state() {
        let entries = vec![entry("a")];
        let first = assemble(&entries, &[], "a.json");
        let second = assemble(&entries, &[], "a.json");
        assert_eq!(first.markdown, second.markdown);
    }
}
