//! ABOUTME: The Template tool: renders one template file through a pluggable
//! ABOUTME: `TemplateEngine`, honoring the file-naming and frontmatter conventions (spec.md §4.2)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::result::{SkipReason, StepResult, StepStatus, ToolResult};
use hypergen_core::step::StepKind;
use hypergen_core::tool::{ExecuteOptions, Tool, ValidationResult};

use hypergen_template::engine::TemplateEngine;
use hypergen_template::operations::{self, InjectMode};

use crate::paths;

/// Parsed `---\n...\n---` frontmatter. Every field is optional; an absent
/// frontmatter block means "render in place, under `outputDir`, using the
/// file-naming rules". Public so the Automatic Template Processing pass
/// (`hypergen-engine`) can apply the same rules to files it discovers
/// outside of an explicit Template step.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Frontmatter {
    pub to: Option<String>,
    #[serde(default)]
    pub inject: bool,
    pub before: Option<String>,
    pub after: Option<String>,
    #[serde(rename = "atLine")]
    pub at_line: Option<usize>,
    #[serde(default)]
    pub prepend: bool,
    #[serde(default)]
    pub append: bool,
    #[serde(rename = "skipIf")]
    pub skip_if: Option<String>,
    pub force: Option<bool>,
}

/// Splits a leading `---\n ... \n---\n` YAML block off `content`, returning
/// the parsed frontmatter (if any) and the remaining template body.
pub fn split_frontmatter(content: &str) -> Result<(Frontmatter, &str)> {
    let Some(rest) = content.strip_prefix("---\n") else {
        return Ok((Frontmatter::default(), content));
    };
    let Some(end) = rest.find("\n---\n") else {
        return Ok((Frontmatter::default(), content));
    };
    let (yaml, body) = rest.split_at(end);
    let body = &body[5..]; // skip "\n---\n"
    let frontmatter: Frontmatter = serde_yaml::from_str(yaml).map_err(|e| {
        HypergenError::tool(
            "template",
            ToolErrorKind::TemplateRender,
            format!("invalid frontmatter: {e}"),
        )
    })?;
    Ok((frontmatter, body))
}

/// Applies the `.jig.t` / `.jig` / `.t.<ext>` file-naming rules, returning
/// the on-disk output name and whether the body should be rendered at all
/// (a file with none of these suffixes is copied through verbatim).
pub fn derive_output_name(file_name: &str) -> (String, bool) {
    if let Some(stripped) = file_name.strip_suffix(".jig.t") {
        return (stripped.to_string(), true);
    }
    if let Some(stripped) = file_name.strip_suffix(".jig") {
        return (stripped.to_string(), true);
    }
    if let Some(pos) = file_name.rfind(".t.") {
        let (before, after) = file_name.split_at(pos);
        return (format!("{before}.{}", &after[3..]), true);
    }
    (file_name.to_string(), false)
}

pub fn inject_mode(fm: &Frontmatter) -> Result<InjectMode> {
    if let Some(marker) = &fm.before {
        return Ok(InjectMode::Before(marker.clone()));
    }
    if let Some(marker) = &fm.after {
        return Ok(InjectMode::After(marker.clone()));
    }
    if let Some(line) = fm.at_line {
        return Ok(InjectMode::AtLine(line));
    }
    if fm.prepend {
        return Ok(InjectMode::Prepend);
    }
    if fm.append {
        return Ok(InjectMode::Append);
    }
    Err(HypergenError::tool(
        "template",
        ToolErrorKind::Inject,
        "inject: true requires one of before/after/atLine/prepend/append",
    ))
}

pub fn env_overwrite() -> bool {
    matches!(
        std::env::var("HYPERGEN_OVERWRITE").as_deref(),
        Ok("1") | Ok("true")
    )
}

pub struct TemplateTool {
    engine: Arc<dyn TemplateEngine>,
}

impl TemplateTool {
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for TemplateTool {
    fn name(&self) -> &str {
        "template"
    }

    async fn validate(&self, step: &StepContext) -> Result<ValidationResult> {
        let StepKind::Template(payload) = &step.step.kind else {
            return Ok(ValidationResult::invalid(vec![
                "template tool received a non-template step".into(),
            ]));
        };
        let source = paths::resolve_in_sandbox(&step.project_root, &payload.template)?;
        if !source.is_file() {
            return Ok(ValidationResult::invalid(vec![format!(
                "template file not found: {}",
                source.display()
            )]));
        }
        Ok(ValidationResult::ok())
    }

    async fn execute(&self, step: &StepContext, options: ExecuteOptions) -> Result<StepResult> {
        let StepKind::Template(payload) = &step.step.kind else {
            return Err(HypergenError::validation("template tool requires a template step"));
        };

        let result = StepResult::pending(&step.step.name, "template");
        let source = paths::resolve_in_sandbox(&step.project_root, &payload.template)?;
        let raw = std::fs::read_to_string(&source).map_err(|e| {
            HypergenError::tool(
                "template",
                ToolErrorKind::TemplateRender,
                format!("failed to read template '{}': {e}", source.display()),
            )
        })?;
        let (frontmatter, body) = split_frontmatter(&raw)?;

        let variables = step.variables.to_json_object();

        if let Some(expr) = &frontmatter.skip_if {
            if hypergen_core::eval_when(expr, &step.variables, step.condition_helpers.as_ref()) {
                return Ok(finish_skipped(result, payload, &source, self.engine.name(), SkipReason::ConditionFalse));
            }
        }

        let output_dir = payload
            .output_dir
            .as_ref()
            .map(|d| paths::resolve_in_sandbox(&step.project_root, d))
            .transpose()?
            .unwrap_or_else(|| step.project_root.clone());

        let dest = resolve_destination(self.engine.as_ref(), &frontmatter, &variables, &source, &output_dir)?;

        let effective_overwrite = payload.overwrite.unwrap_or(frontmatter.force.unwrap_or(false))
            || step.force
            || options.force
            || env_overwrite();

        if !frontmatter.inject && dest.exists() && !effective_overwrite {
            return Ok(finish_skipped(result, payload, &source, self.engine.name(), SkipReason::Exists));
        }

        let rendered = if body_needs_render(&source) {
            self.engine
                .render(body, &variables, step.collect_mode, step.answers.as_ref(), &source.to_string_lossy())
                .map_err(|e| HypergenError::tool("template", ToolErrorKind::TemplateRender, e.to_string()))?
        } else {
            body.to_string()
        };

        if options.dry_run || step.dry_run {
            return Ok(StepResult {
                tool_result: Some(ToolResult::Template {
                    template_name: template_file_name(&source),
                    template_path: source.to_string_lossy().to_string(),
                    engine: self.engine.name().to_string(),
                    files_generated: vec![dest.to_string_lossy().to_string()],
                    variables: as_map(&variables),
                    skipped: None,
                }),
                ..result.finish(StepStatus::Completed)
            });
        }

        let files_generated = if frontmatter.inject {
            let mode = inject_mode(&frontmatter)?;
            operations::inject(&dest, &rendered, &mode)?;
            vec![dest.to_string_lossy().to_string()]
        } else {
            operations::add(&dest, &rendered, effective_overwrite)?;
            vec![dest.to_string_lossy().to_string()]
        };

        Ok(StepResult {
            files_created: files_generated.clone(),
            tool_result: Some(ToolResult::Template {
                template_name: template_file_name(&source),
                template_path: source.to_string_lossy().to_string(),
                engine: self.engine.name().to_string(),
                files_generated,
                variables: as_map(&variables),
                skipped: None,
            }),
            ..result.finish(StepStatus::Completed)
        })
    }
}

pub fn template_file_name(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn body_needs_render(source: &Path) -> bool {
    let name = template_file_name(source);
    derive_output_name(&name).1
}

fn resolve_destination(
    engine: &dyn TemplateEngine,
    frontmatter: &Frontmatter,
    variables: &serde_json::Value,
    source: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    if let Some(to) = &frontmatter.to {
        let rendered_to = engine
            .render(to, variables, false, None, &source.to_string_lossy())
            .map_err(|e| HypergenError::tool("template", ToolErrorKind::TemplateRender, e.to_string()))?;
        return Ok(if Path::new(&rendered_to).is_absolute() {
            PathBuf::from(rendered_to)
        } else {
            output_dir.join(rendered_to)
        });
    }
    let (name, _) = derive_output_name(&template_file_name(source));
    Ok(output_dir.join(name))
}

fn finish_skipped(
    result: StepResult,
    payload: &hypergen_core::step::TemplateStep,
    source: &Path,
    engine_name: &str,
    reason: SkipReason,
) -> StepResult {
    let _ = payload;
    StepResult {
        tool_result: Some(ToolResult::Template {
            template_name: template_file_name(source),
            template_path: source.to_string_lossy().to_string(),
            engine: engine_name.to_string(),
            files_generated: vec![],
            variables: HashMap::new(),
            skipped: Some(reason),
        }),
        ..result.finish(StepStatus::Completed)
    }
}

fn as_map(value: &serde_json::Value) -> HashMap<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_output_name_for_jig_t_suffix() {
        assert_eq!(derive_output_name("component.jig.t"), ("component".to_string(), true));
    }

    #[test]
    fn derives_output_name_for_jig_suffix() {
        assert_eq!(derive_output_name("README.jig"), ("README".to_string(), true));
    }

    #[test]
    fn derives_output_name_for_t_infix() {
        assert_eq!(derive_output_name("component.t.tsx"), ("component.tsx".to_string(), true));
    }

    #[test]
    fn plain_file_is_copied_verbatim() {
        assert_eq!(derive_output_name("logo.svg"), ("logo.svg".to_string(), false));
    }

    #[test]
    fn frontmatter_splits_yaml_header_from_body() {
        let content = "---\nto: src/{{ name }}.rs\ninject: false\n---\nfn main() {}\n";
        let (fm, body) = split_frontmatter(content).unwrap();
        assert_eq!(fm.to.as_deref(), Some("src/{{ name }}.rs"));
        assert_eq!(body, "fn main() {}\n");
    }

    #[test]
    fn content_without_frontmatter_is_returned_whole() {
        let content = "just a plain file\n";
        let (fm, body) = split_frontmatter(content).unwrap();
        assert!(fm.to.is_none());
        assert_eq!(body, content);
    }

    // HYPERGEN_OVERWRITE is process-global; run this serially so it can't
    // race another test's env::set_var/remove_var in the same binary.
    #[test]
    #[serial_test::serial]
    fn env_overwrite_reads_truthy_values_and_defaults_to_false() {
        std::env::remove_var("HYPERGEN_OVERWRITE");
        assert!(!env_overwrite());

        std::env::set_var("HYPERGEN_OVERWRITE", "1");
        assert!(env_overwrite());

        std::env::set_var("HYPERGEN_OVERWRITE", "true");
        assert!(env_overwrite());

        std::env::set_var("HYPERGEN_OVERWRITE", "0");
        assert!(!env_overwrite());

        std::env::remove_var("HYPERGEN_OVERWRITE");
    }
}
