//! ABOUTME: The Recipe Engine: loads and validates a recipe, merges its variable schema
//! ABOUTME: against supplied values, plans and runs its steps in dependency order (threading
//! ABOUTME: exports forward the way the Sequence tool does), fires lifecycle hooks, drives the
//! ABOUTME: two-pass AI templating protocol to completion or deferral, and renders the
//! ABOUTME: recipe's `onSuccess`/`onError` message (spec.md §3, §4.5, §4.8, §4.10-§4.12, §6-§7).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

use hypergen_core::context::StepContext;
use hypergen_core::error::{HypergenError, Result};
use hypergen_core::execution::{EngineOptions, MessageLevel, RecipeExecution, RecipeSource};
use hypergen_core::recipe::Recipe;
use hypergen_core::recursion::{RecipeRunner, SharedRecipeRunner, SharedStepRunner, StepRunner};
use hypergen_core::result::{ExecutionMetadata, StepResult, StepStatus};
use hypergen_core::step::{ActionStep, Step, StepKind};
use hypergen_core::variables::Variables;
use hypergen_core::RecipeIdentity;

use hypergen_template::ai::assembler::assemble;
use hypergen_template::ai::collector::AiCollector;
use hypergen_template::ai::transport::{AiTransport, StdoutTransport, TransportOutcome};
use hypergen_template::engine::TemplateEngine;
use hypergen_template::jig::JigEngine;

use hypergen_tools::{
    ActionContext, ActionRegistry, ActionTool, AiTool, CodeModTool, Communication, EnsureDirsTool,
    InstallTool, ParallelTool, PatchTool, PromptTool, QueryTool, RecipeTool, SequenceTool,
    ShellTool, TemplateTool, ToolRegistry,
};

use crate::config::EngineConfig;
use crate::executor::StepExecutor;
use crate::planner;
use crate::template_processing;

/// Upgrades a `Weak<RecipeEngine>` into the two re-entry traits the
/// Sequence/Parallel/Recipe tools depend on. Keeping the engine's own
/// `Arc` weak here means the engine can be dropped normally; a strong
/// self-reference inside its own tool registry would leak it forever.
struct EngineHandle(Weak<RecipeEngine>);

impl EngineHandle {
    fn upgrade(&self) -> Result<Arc<RecipeEngine>> {
        self.0.upgrade().ok_or_else(|| HypergenError::Internal {
            message: "recipe engine was dropped mid-run".into(),
            cause: None,
        })
    }
}

#[async_trait]
impl StepRunner for EngineHandle {
    async fn run_step(&self, step: &Step, parent: &StepContext) -> Result<StepResult> {
        self.upgrade()?.executor.run_step(step, parent).await
    }
}

#[async_trait]
impl RecipeRunner for EngineHandle {
    async fn run_recipe(&self, source: RecipeSource, options: EngineOptions) -> Result<RecipeExecution> {
        self.upgrade()?.execute_recipe(source, options).await
    }
}

/// Top-level orchestrator implementing the engine's public contract
/// (spec.md §6's `executeRecipe`). One instance is built once per host
/// process (or test) and reused across runs; its tool registry, Action
/// registry, and AI collector all live for the engine's lifetime.
pub struct RecipeEngine {
    config: EngineConfig,
    executor: StepExecutor,
    action_registry: Arc<ActionRegistry>,
    template_engine: Arc<dyn TemplateEngine>,
    ai_transport: Arc<dyn AiTransport>,
    /// Backs the two-pass AI protocol's Pass-1 accumulation (spec.md
    /// §4.8). Scoped to this engine instance rather than
    /// `AiCollector::global()`, so two `RecipeEngine`s in the same test
    /// process never cross-contaminate each other's collected blocks.
    ai_collector: Arc<AiCollector>,
    /// Cycle guard keyed by `(recipe_id, variable_fingerprint)` (spec.md
    /// §4.5): a nested Recipe step invoking the same recipe with the same
    /// variables it was itself invoked with is rejected rather than
    /// recursing forever.
    in_flight: Mutex<HashSet<(String, String)>>,
    /// Counts nested `execute_recipe` calls on the current call stack.
    /// Only the outermost call resets/harvests the AI collector — a
    /// nested Recipe step's Pass-1 entries still land in the same
    /// collector and are assembled into one consolidated prompt.
    depth: AtomicU32,
}

impl RecipeEngine {
    /// Builds a fully wired engine: every built-in tool registered, with
    /// Sequence, Parallel, and Recipe holding a callback into this engine
    /// instance itself so nested/child steps re-enter the same executor
    /// (spec.md §4.10's recursion requirement) without `hypergen-tools`
    /// depending on this crate.
    pub fn new(config: EngineConfig, action_registry: Arc<ActionRegistry>, ai_transport: Arc<dyn AiTransport>) -> Arc<Self> {
        let ai_collector = Arc::new(AiCollector::new());
        let template_engine: Arc<dyn TemplateEngine> = Arc::new(JigEngine::with_collector(ai_collector.clone()));

        Arc::new_cyclic(|weak| {
            let handle = Arc::new(EngineHandle(weak.clone()));
            let step_runner: SharedStepRunner = handle.clone();
            let recipe_runner: SharedRecipeRunner = handle;

            let mut registry = ToolRegistry::new();
            registry.register(Arc::new(TemplateTool::new(template_engine.clone())));
            registry.register(Arc::new(ActionTool::new(action_registry.clone())));
            registry.register(Arc::new(CodeModTool::new()));
            registry.register(Arc::new(RecipeTool::new(recipe_runner)));
            registry.register(Arc::new(ShellTool));
            registry.register(Arc::new(PromptTool::default()));
            registry.register(Arc::new(InstallTool));
            registry.register(Arc::new(QueryTool));
            registry.register(Arc::new(PatchTool));
            registry.register(Arc::new(EnsureDirsTool));
            registry.register(Arc::new(SequenceTool::new(step_runner.clone())));
            registry.register(Arc::new(ParallelTool::new(step_runner)));
            registry.register(Arc::new(AiTool::new(ai_transport.clone())));

            let executor = StepExecutor::new(Arc::new(registry), template_engine.clone(), config.clone());

            Self {
                config,
                executor,
                action_registry,
                template_engine,
                ai_transport,
                ai_collector,
                in_flight: Mutex::new(HashSet::new()),
                depth: AtomicU32::new(0),
            }
        })
    }

    /// The default stack: an empty Action registry (the host registers its
    /// own actions before the first run) and the stdout AI transport,
    /// which defers every collected prompt to an external caller.
    pub fn with_defaults() -> Arc<Self> {
        Self::new(EngineConfig::default(), Arc::new(ActionRegistry::new()), Arc::new(StdoutTransport))
    }

    /// The engine's public entry point (spec.md §6's `executeRecipe`):
    /// never throws through this boundary — every failure becomes a
    /// populated `RecipeExecution { success: false, error: Some(...), .. }`
    /// except for I/O/parse failures reading the recipe document itself,
    /// which are caller configuration errors rather than runtime ones.
    pub async fn execute_recipe(&self, source: RecipeSource, options: EngineOptions) -> Result<RecipeExecution> {
        let is_top_level = self.depth.fetch_add(1, Ordering::SeqCst) == 0;
        let result = self.execute_recipe_inner(source, options, is_top_level).await;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn execute_recipe_inner(&self, source: RecipeSource, options: EngineOptions, is_top_level: bool) -> Result<RecipeExecution> {
        let (yaml, source_path, name_hint) = match &source {
            RecipeSource::File(path) => {
                let yaml = std::fs::read_to_string(path)
                    .map_err(|e| HypergenError::config(format!("failed to read recipe '{}': {e}", path.display())))?;
                (yaml, Some(path.clone()), path.file_stem().map(|s| s.to_string_lossy().to_string()))
            }
            RecipeSource::Content { yaml, name } => (yaml.clone(), None, name.clone()),
        };

        let recipe = Recipe::from_yaml(&yaml)?;
        recipe.validate()?;
        let recipe_name = name_hint.unwrap_or_else(|| recipe.name.clone());

        let project_root = options.working_dir.clone();
        let variables = self.merge_variables(&recipe, &options, &project_root)?;

        let recipe_id = format!("{recipe_name}@{}", recipe.version.as_deref().unwrap_or("0"));
        let fingerprint = canonical_fingerprint(&variables);
        let identity_key = (recipe_id.clone(), fingerprint.clone());

        if !self.in_flight.lock().insert(identity_key.clone()) {
            return Err(HypergenError::config(format!(
                "recursive recipe invocation detected: '{recipe_id}' invoked again with identical variables"
            )));
        }
        let identity = RecipeIdentity { recipe_id, variable_fingerprint: fingerprint };

        let outcome = self
            .run_recipe_body(&recipe, &recipe_name, variables, &options, &project_root, &identity, source_path.as_deref(), is_top_level)
            .await;

        self.in_flight.lock().remove(&identity_key);
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_recipe_body(
        &self,
        recipe: &Recipe,
        recipe_name: &str,
        variables: Variables,
        options: &EngineOptions,
        project_root: &Path,
        identity: &RecipeIdentity,
        source_path: Option<&Path>,
        is_top_level: bool,
    ) -> Result<RecipeExecution> {
        let collect_mode = options.collect_mode.unwrap_or_else(|| options.answers.is_none());
        if is_top_level && collect_mode {
            self.ai_collector.reset();
        }

        let lifecycle_ctx = self.synthetic_context("lifecycle", &variables, project_root, identity, options, collect_mode);
        self.invoke_hooks(&recipe.hooks.before_recipe, &lifecycle_ctx);

        let mut accumulated = variables;
        let mut prior_results: HashMap<String, StepResult> = HashMap::new();
        let mut ordered_results: Vec<StepResult> = Vec::new();
        let mut fatal_error: Option<String> = None;

        if let Some(template_steps) = &recipe.template_steps {
            self.run_step_list(&template_steps.pre, &mut accumulated, &mut prior_results, &mut ordered_results, project_root, identity, options, collect_mode, &mut fatal_error)
                .await;
        }

        if fatal_error.is_none() {
            match planner::plan(&recipe.steps) {
                Ok(order) => {
                    for idx in order {
                        let step = &recipe.steps[idx];
                        self.invoke_hooks(&recipe.hooks.before_step, &lifecycle_ctx);

                        let parent = StepContext {
                            step: step.clone(),
                            variables: accumulated.clone(),
                            project_root: project_root.to_path_buf(),
                            prior_results: prior_results.clone(),
                            recipe_identity: identity.clone(),
                            condition_helpers: lifecycle_ctx.condition_helpers.clone(),
                            answers: options.answers.clone(),
                            collect_mode,
                            dry_run: options.dry_run,
                            force: options.force,
                            skip_prompts: options.skip_prompts,
                        };

                        match self.executor.run_step(step, &parent).await {
                            Ok(result) => {
                                merge_exports(&result, &mut accumulated);
                                prior_results.insert(step.name.clone(), result.clone());
                                ordered_results.push(result);
                                self.invoke_hooks(&recipe.hooks.after_step, &lifecycle_ctx);
                            }
                            Err(err) => {
                                fatal_error = Some(err.to_string());
                                break;
                            }
                        }
                    }
                }
                Err(err) => fatal_error = Some(err.to_string()),
            }
        }

        let used_automatic_processing = fatal_error.is_none()
            && self.config.automatic_template_processing
            && !recipe_has_template_steps(&recipe.steps)
            && source_path.is_some();
        if used_automatic_processing {
            if let Some(path) = source_path {
                if let Some(templates_dir) = path.parent().map(|p| p.join("templates")) {
                    let ctx = self.synthetic_context("auto-template", &accumulated, project_root, identity, options, collect_mode);
                    match template_processing::run(&templates_dir, &ctx, self.template_engine.as_ref()) {
                        Ok(results) => ordered_results.extend(results),
                        Err(err) => fatal_error = Some(err.to_string()),
                    }
                }
            }
        }

        if fatal_error.is_none() {
            if let Some(template_steps) = &recipe.template_steps {
                self.run_step_list(&template_steps.post, &mut accumulated, &mut prior_results, &mut ordered_results, project_root, identity, options, collect_mode, &mut fatal_error)
                    .await;
            }
        }

        let mut deferred_prompt = None;
        if is_top_level && collect_mode && fatal_error.is_none() {
            deferred_prompt = self
                .resolve_ai_pass(recipe, recipe_name, &accumulated, project_root, identity, options, &mut prior_results)
                .await?;
        }

        let success = fatal_error.is_none();
        if success {
            self.invoke_hooks(&recipe.hooks.after_recipe, &lifecycle_ctx);
        } else {
            self.invoke_hooks(&recipe.hooks.on_error, &lifecycle_ctx);
            self.invoke_hooks(&recipe.hooks.after_recipe, &lifecycle_ctx);
        }

        let status_label = if success { "completed" } else { "failed" };
        let provides = crate::output_evaluator::evaluate_exports(
            &recipe.provides,
            recipe_name,
            status_label,
            None,
            &accumulated,
            lifecycle_ctx.condition_helpers.as_ref(),
            self.template_engine.as_ref(),
        );

        let rendered_message = self.render_message(recipe, success, &accumulated);
        if let Some(message) = &rendered_message {
            let level = if success { MessageLevel::Info } else { MessageLevel::Error };
            if let Some(on_message) = &options.on_message {
                on_message(level, message);
            }
        }
        if let Some(on_step_result) = &options.on_step_result {
            for result in &ordered_results {
                on_step_result(result);
            }
        }

        let metadata = ExecutionMetadata::from_results(&ordered_results, project_root.display().to_string());

        Ok(RecipeExecution {
            recipe_name: recipe_name.to_string(),
            success,
            step_results: ordered_results,
            metadata,
            provides,
            rendered_message,
            deferred_prompt,
            error: fatal_error,
        })
    }

    /// Runs a plain ordered list of steps (the `templateSteps.pre`/`.post`
    /// lists, which aren't part of the `dependsOn` graph), threading
    /// exports forward the same way the Sequence tool does for its
    /// children.
    #[allow(clippy::too_many_arguments)]
    async fn run_step_list(
        &self,
        steps: &[Step],
        accumulated: &mut Variables,
        prior_results: &mut HashMap<String, StepResult>,
        ordered_results: &mut Vec<StepResult>,
        project_root: &Path,
        identity: &RecipeIdentity,
        options: &EngineOptions,
        collect_mode: bool,
        fatal_error: &mut Option<String>,
    ) {
        if fatal_error.is_some() {
            return;
        }
        for step in steps {
            let parent = StepContext {
                step: step.clone(),
                variables: accumulated.clone(),
                project_root: project_root.to_path_buf(),
                prior_results: prior_results.clone(),
                recipe_identity: identity.clone(),
                condition_helpers: Arc::new(hypergen_core::FsConditionHelpers { project_root: project_root.to_path_buf() }),
                answers: options.answers.clone(),
                collect_mode,
                dry_run: options.dry_run,
                force: options.force,
                skip_prompts: options.skip_prompts,
            };
            match self.executor.run_step(step, &parent).await {
                Ok(result) => {
                    merge_exports(&result, accumulated);
                    prior_results.insert(step.name.clone(), result.clone());
                    ordered_results.push(result);
                }
                Err(err) => {
                    *fatal_error = Some(err.to_string());
                    return;
                }
            }
        }
    }

    /// Assembles the Prompt Assembler document from everything the Pass-1
    /// run collected and asks the AI transport to resolve it. A deferred
    /// outcome returns the markdown for the caller to act on out of band;
    /// an immediately-resolved outcome re-renders the recipe's own
    /// top-level `Template` steps and its Automatic Template Processing
    /// pass with the answers in hand. Nested recipes' own template steps
    /// are not re-rendered automatically in that case — their entries are
    /// still part of the single consolidated prompt, but resolving them
    /// requires either the deferred round trip or the nested recipe being
    /// re-invoked directly with `--answers` (documented in DESIGN.md).
    #[allow(clippy::too_many_arguments)]
    async fn resolve_ai_pass(
        &self,
        recipe: &Recipe,
        recipe_name: &str,
        accumulated: &Variables,
        project_root: &Path,
        identity: &RecipeIdentity,
        options: &EngineOptions,
        prior_results: &mut HashMap<String, StepResult>,
    ) -> Result<Option<String>> {
        let entries = self.ai_collector.entries();
        if entries.is_empty() {
            return Ok(None);
        }
        let global_contexts = self.ai_collector.global_contexts();
        let assembled = assemble(&entries, &global_contexts, &format!("{recipe_name}.answers.json"));

        match self.ai_transport.resolve(&assembled).await {
            Ok(TransportOutcome::Deferred { .. }) => Ok(Some(assembled.markdown)),
            Ok(TransportOutcome::Resolved { answers }) => {
                for step in &recipe.steps {
                    if !matches!(step.kind, StepKind::Template(_)) {
                        continue;
                    }
                    let parent = StepContext {
                        step: step.clone(),
                        variables: accumulated.clone(),
                        project_root: project_root.to_path_buf(),
                        prior_results: prior_results.clone(),
                        recipe_identity: identity.clone(),
                        condition_helpers: Arc::new(hypergen_core::FsConditionHelpers { project_root: project_root.to_path_buf() }),
                        answers: Some(answers.clone()),
                        collect_mode: false,
                        dry_run: options.dry_run,
                        force: options.force,
                        skip_prompts: options.skip_prompts,
                    };
                    if let Ok(result) = self.executor.run_step(step, &parent).await {
                        prior_results.insert(step.name.clone(), result);
                    }
                }
                self.ai_collector.clear();
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "AI transport failed to resolve the collected prompt; Pass-1 placeholders stand");
                Ok(None)
            }
        }
    }

    fn render_message(&self, recipe: &Recipe, success: bool, variables: &Variables) -> Option<String> {
        let template = if success { recipe.on_success.as_deref() } else { recipe.on_error.as_deref() }?;
        let context = variables.to_json_object();
        match self.template_engine.render(template, &context, false, None, "<recipe-message>") {
            Ok(rendered) => Some(rendered),
            Err(err) => {
                warn!(error = %err, "failed to render recipe onSuccess/onError message");
                Some(template.to_string())
            }
        }
    }

    fn synthetic_context(
        &self,
        label: &str,
        variables: &Variables,
        project_root: &Path,
        identity: &RecipeIdentity,
        options: &EngineOptions,
        collect_mode: bool,
    ) -> StepContext {
        let step = Step {
            name: format!("lifecycle:{label}"),
            description: None,
            when: None,
            depends_on: vec![],
            parallel: false,
            continue_on_error: true,
            timeout_ms: None,
            retries: 0,
            variables: HashMap::new(),
            environment: HashMap::new(),
            exports: HashMap::new(),
            kind: StepKind::Action(ActionStep { action: format!("hypergen:{label}"), parameters: HashMap::new(), dry_run: None, force: None }),
        };
        let mut ctx = StepContext::new(step, variables.clone(), project_root.to_path_buf(), identity.clone());
        ctx.answers = options.answers.clone();
        ctx.collect_mode = collect_mode;
        ctx.dry_run = options.dry_run;
        ctx.force = options.force;
        ctx.skip_prompts = options.skip_prompts;
        ctx
    }

    /// Hook actions are best-effort (spec.md §3's `hooks` are lifecycle
    /// notifications, not gating steps): a missing action or a failed one
    /// is logged, never fatal to the recipe run.
    fn invoke_hooks(&self, names: &[String], ctx: &StepContext) {
        for name in names {
            let action_ctx = ActionContext {
                parameters: HashMap::new(),
                step: ctx,
                communication: Arc::new(Communication::default()),
                dry_run: ctx.dry_run,
                force: ctx.force,
            };
            match self.action_registry.invoke(name, action_ctx) {
                Ok(outcome) if !outcome.success => {
                    warn!(hook = %name, message = %outcome.message, "hook action reported failure");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(hook = %name, error = %err, "hook action could not run");
                }
            }
        }
    }

    /// Merges CLI/caller-supplied `variables:` over the recipe's schema
    /// defaults, requiring every `required: true` entry to be present
    /// after that merge, and evaluating each entry's `validate` expression
    /// against the final value (spec.md §3, §4.6).
    fn merge_variables(&self, recipe: &Recipe, options: &EngineOptions, project_root: &Path) -> Result<Variables> {
        let mut vars = Variables::new();
        for (name, spec) in &recipe.variables {
            if let Some(value) = options.variables.get(name) {
                vars.insert(name.clone(), value.clone());
            } else if let Some(default) = &spec.default {
                vars.insert(name.clone(), default.clone());
            } else if spec.required {
                let mut err = HypergenError::validation(format!("missing required variable '{name}'"));
                if let Some(prompt) = &spec.prompt {
                    err = err.with_suggestion(prompt.clone());
                }
                return Err(err);
            }
        }
        for (name, value) in &options.variables {
            if !vars.contains_key(name) {
                vars.insert(name.clone(), value.clone());
            }
        }

        let helpers = hypergen_core::FsConditionHelpers { project_root: project_root.to_path_buf() };
        for (name, spec) in &recipe.variables {
            let Some(expr) = &spec.validate else { continue };
            let Some(value) = vars.get(name).cloned() else { continue };
            let mut scratch = vars.clone();
            scratch.insert("value", value);
            if !hypergen_core::eval_when(expr, &scratch, &helpers) {
                return Err(HypergenError::validation(format!("variable '{name}' failed its validation expression '{expr}'")));
            }
        }
        Ok(vars)
    }
}

#[async_trait]
impl StepRunner for RecipeEngine {
    async fn run_step(&self, step: &Step, parent: &StepContext) -> Result<StepResult> {
        self.executor.run_step(step, parent).await
    }
}

#[async_trait]
impl RecipeRunner for RecipeEngine {
    async fn run_recipe(&self, source: RecipeSource, options: EngineOptions) -> Result<RecipeExecution> {
        self.execute_recipe(source, options).await
    }
}

fn merge_exports(result: &StepResult, accumulated: &mut Variables) {
    if let Some(Value::Object(exports)) = result.metadata.get("exports") {
        for (key, value) in exports {
            accumulated.insert(key.clone(), value.clone());
        }
    }
}

fn recipe_has_template_steps(steps: &[Step]) -> bool {
    steps.iter().any(|s| match &s.kind {
        StepKind::Template(_) => true,
        StepKind::Sequence(payload) => recipe_has_template_steps(&payload.steps),
        StepKind::Parallel(payload) => recipe_has_template_steps(&payload.steps),
        _ => false,
    })
}

/// A stable, order-independent fingerprint of a variable bag: the
/// recursion guard's key half (spec.md §4.5 — "same recipe, same
/// variables"). Sorting by key before serializing means two semantically
/// identical bags always fingerprint identically regardless of insertion
/// order.
fn canonical_fingerprint(variables: &Variables) -> String {
    let mut entries: Vec<(&String, &Value)> = variables.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    serde_json::to_string(&entries).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypergen_template::ai::transport::StdoutTransport;

    fn engine() -> Arc<RecipeEngine> {
        RecipeEngine::new(EngineConfig::default(), Arc::new(ActionRegistry::new()), Arc::new(StdoutTransport))
    }

    fn write_recipe(dir: &Path, yaml: &str) -> PathBuf {
        let path = dir.join("recipe.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[tokio::test]
    async fn runs_a_simple_template_recipe_and_reports_success() {
        let project = tempfile::tempdir().unwrap();
        std::fs::write(project.path().join("hello.jig"), "Hello {{ name }}").unwrap();
        let recipe_yaml = r#"
name: greet
variables:
  name:
    type: string
    default: world
steps:
  - name: write-hello
    tool: template
    template: hello.jig
"#;
        let recipe_path = write_recipe(project.path(), recipe_yaml);

        let engine = engine();
        let options = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
        let execution = engine.execute_recipe(RecipeSource::File(recipe_path), options).await.unwrap();

        assert!(execution.success);
        assert!(project.path().join("hello").exists());
        assert_eq!(execution.step_results.len(), 1);
    }

    #[tokio::test]
    async fn missing_required_variable_without_default_fails_before_running_steps() {
        let project = tempfile::tempdir().unwrap();
        let recipe_yaml = r#"
name: needs-var
variables:
  target:
    type: string
    required: true
steps:
  - name: noop
    tool: ensureDirs
    paths: []
"#;
        let recipe_path = write_recipe(project.path(), recipe_yaml);
        let engine = engine();
        let options = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
        let result = engine.execute_recipe(RecipeSource::File(recipe_path), options).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn exports_from_one_step_are_visible_to_a_later_step() {
        let project = tempfile::tempdir().unwrap();
        std::fs::write(project.path().join("data.json"), r#"{"greeting": "hi"}"#).unwrap();
        std::fs::write(project.path().join("out.jig"), "{{ greeting }}").unwrap();
        let recipe_yaml = r#"
name: chained
steps:
  - name: read
    tool: query
    file: data.json
    format: json
    exports:
      greeting: greeting
  - name: write
    tool: template
    template: out.jig
    dependsOn: [read]
"#;
        let recipe_path = write_recipe(project.path(), recipe_yaml);
        let engine = engine();
        let options = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
        let execution = engine.execute_recipe(RecipeSource::File(recipe_path), options).await.unwrap();
        assert!(execution.success);
        let written = std::fs::read_to_string(project.path().join("out")).unwrap();
        assert_eq!(written, "hi");
    }

    #[tokio::test]
    async fn recursive_recipe_invocation_with_identical_variables_is_rejected() {
        let project = tempfile::tempdir().unwrap();
        let recipe_yaml = r#"
name: self-recurse
steps:
  - name: recurse
    tool: recipe
    recipe: recipe.yaml
"#;
        let recipe_path = write_recipe(project.path(), recipe_yaml);
        let engine = engine();
        let options = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
        let execution = engine.execute_recipe(RecipeSource::File(recipe_path), options).await;
        // The nested Recipe step's own `run_recipe` call surfaces the cycle
        // guard's error, which the Recipe tool propagates as a failed step;
        // the top-level call itself still returns an execution record.
        match execution {
            Ok(exec) => assert!(!exec.success),
            Err(_) => {}
        }
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let mut a = Variables::new();
        a.insert("b", Value::from(2));
        a.insert("a", Value::from(1));
        let mut b = Variables::new();
        b.insert("a", Value::from(1));
        b.insert("b", Value::from(2));
        assert_eq!(canonical_fingerprint(&a), canonical_fingerprint(&b));
    }
}
