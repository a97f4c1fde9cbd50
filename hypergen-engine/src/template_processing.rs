//! ABOUTME: Automatic Template Processing: walks `./templates/` next to a recipe and applies
//! ABOUTME: the Template tool's naming/frontmatter rules to every file, even when the recipe
//! ABOUTME: declares no explicit template steps (spec.md §4.12)

use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result, ToolErrorKind};
use hypergen_core::result::{SkipReason, StepResult, StepStatus, ToolResult};
use hypergen_template::engine::TemplateEngine;
use hypergen_template::operations;
use hypergen_tools::paths;
use hypergen_tools::template::{
    body_needs_render, derive_output_name, env_overwrite, inject_mode, split_frontmatter, template_file_name, Frontmatter,
};

/// Discovers every file under `templates_dir` and renders/writes/injects
/// each one per the Template tool's rules, with output paths relative to
/// `ctx.project_root`. Returns one leaf `StepResult` per discovered file.
pub fn run(templates_dir: &Path, ctx: &StepContext, engine: &dyn TemplateEngine) -> Result<Vec<StepResult>> {
    if !templates_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut results = Vec::new();
    for entry in WalkDir::new(templates_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        results.push(process_one(entry.path(), templates_dir, ctx, engine)?);
    }
    results.sort_by(|a, b| a.step_name.cmp(&b.step_name));
    Ok(results)
}

fn process_one(source: &Path, templates_dir: &Path, ctx: &StepContext, engine: &dyn TemplateEngine) -> Result<StepResult> {
    let relative = source.strip_prefix(templates_dir).unwrap_or(source);
    let step_name = relative.to_string_lossy().to_string();
    let result = StepResult::pending(&step_name, "template");

    let raw = std::fs::read_to_string(source).map_err(|e| {
        HypergenError::tool("template", ToolErrorKind::TemplateRender, format!("failed to read '{}': {e}", source.display()))
    })?;
    let (frontmatter, body) = split_frontmatter(&raw)?;
    let variables = ctx.variables.to_json_object();

    if let Some(expr) = &frontmatter.skip_if {
        if hypergen_core::eval_when(expr, &ctx.variables, ctx.condition_helpers.as_ref()) {
            return Ok(finish_skipped(result, source, engine.name(), SkipReason::ConditionFalse));
        }
    }

    let dest = resolve_destination(engine, &frontmatter, &variables, source, &ctx.project_root)?;

    let effective_overwrite =
        frontmatter.force.unwrap_or(false) || ctx.force || env_overwrite();

    if !frontmatter.inject && dest.exists() && !effective_overwrite {
        return Ok(finish_skipped(result, source, engine.name(), SkipReason::Exists));
    }

    let rendered = if body_needs_render(source) {
        engine
            .render(body, &variables, ctx.collect_mode, ctx.answers.as_ref(), &source.to_string_lossy())
            .map_err(|e| HypergenError::tool("template", ToolErrorKind::TemplateRender, e.to_string()))?
    } else {
        body.to_string()
    };

    if ctx.dry_run {
        return Ok(StepResult {
            tool_result: Some(ToolResult::Template {
                template_name: template_file_name(source),
                template_path: source.to_string_lossy().to_string(),
                engine: engine.name().to_string(),
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
            template_name: template_file_name(source),
            template_path: source.to_string_lossy().to_string(),
            engine: engine.name().to_string(),
            files_generated,
            variables: as_map(&variables),
            skipped: None,
        }),
        ..result.finish(StepStatus::Completed)
    })
}

fn resolve_destination(
    engine: &dyn TemplateEngine,
    frontmatter: &Frontmatter,
    variables: &Value,
    source: &Path,
    project_root: &Path,
) -> Result<PathBuf> {
    if let Some(to) = &frontmatter.to {
        let rendered_to = engine
            .render(to, variables, false, None, &source.to_string_lossy())
            .map_err(|e| HypergenError::tool("template", ToolErrorKind::TemplateRender, e.to_string()))?;
        return paths::resolve_in_sandbox(project_root, &rendered_to);
    }
    let (name, _) = derive_output_name(&template_file_name(source));
    paths::resolve_in_sandbox(project_root, &name)
}

fn finish_skipped(result: StepResult, source: &Path, engine_name: &str, reason: SkipReason) -> StepResult {
    StepResult {
        tool_result: Some(ToolResult::Template {
            template_name: template_file_name(source),
            template_path: source.to_string_lossy().to_string(),
            engine: engine_name.to_string(),
            files_generated: vec![],
            variables: Default::default(),
            skipped: Some(reason),
        }),
        ..result.finish(StepStatus::Completed)
    }
}

fn as_map(value: &Value) -> std::collections::HashMap<String, Value> {
    value.as_object().cloned().unwrap_or_default().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypergen_core::RecipeIdentity;
    use hypergen_template::jig::JigEngine;

    #[test]
    fn walks_templates_dir_and_writes_every_file() {
        let templates = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::write(templates.path().join("readme.jig"), "Hello {{ name }}").unwrap();
        std::fs::create_dir(templates.path().join("src")).unwrap();
        std::fs::write(templates.path().join("src/lib.t.rs"), "// {{ name }}").unwrap();

        let step = hypergen_core::step::Step {
            name: "auto".into(),
            description: None,
            when: None,
            depends_on: vec![],
            parallel: false,
            continue_on_error: false,
            timeout_ms: None,
            retries: 0,
            variables: Default::default(),
            environment: Default::default(),
            exports: Default::default(),
            kind: hypergen_core::step::StepKind::EnsureDirs(hypergen_core::step::EnsureDirsStep { paths: vec![] }),
        };
        let mut ctx = StepContext::new(
            step,
            Default::default(),
            project.path().to_path_buf(),
            RecipeIdentity { recipe_id: "r".into(), variable_fingerprint: "f".into() },
        );
        ctx.variables.insert("name", Value::String("world".into()));

        let engine = JigEngine::new();
        let results = run(templates.path(), &ctx, &engine).unwrap();
        assert_eq!(results.len(), 2);
        assert!(project.path().join("readme").exists());
        assert!(project.path().join("src/lib.rs").exists());
    }
}
