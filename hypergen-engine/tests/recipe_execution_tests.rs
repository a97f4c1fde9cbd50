//! ABOUTME: End-to-end recipe execution tests exercising the concrete scenarios
//! ABOUTME: the data model and step executor are expected to satisfy together

use std::path::Path;
use std::sync::Arc;

use hypergen_core::execution::{EngineOptions, RecipeSource};
use hypergen_engine::config::EngineConfig;
use hypergen_engine::engine::RecipeEngine;
use hypergen_template::ai::transport::StdoutTransport;
use hypergen_tools::ActionRegistry;

fn engine() -> Arc<RecipeEngine> {
    RecipeEngine::new(EngineConfig::default(), Arc::new(ActionRegistry::new()), Arc::new(StdoutTransport))
}

fn write_recipe(dir: &Path, yaml: &str) -> std::path::PathBuf {
    let path = dir.join("recipe.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

#[tokio::test]
async fn template_step_skips_existing_target_without_force() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("to.txt.jig"), "Hello {{ name }}!").unwrap();
    std::fs::write(project.path().join("to.txt"), "already here").unwrap();

    let recipe_yaml = r#"
name: greet
variables:
  name:
    type: string
    default: world
steps:
  - name: write
    tool: template
    template: to.txt.jig
"#;
    let recipe_path = write_recipe(project.path(), recipe_yaml);
    let engine = engine();
    let options = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
    let execution = engine.execute_recipe(RecipeSource::File(recipe_path), options).await.unwrap();

    assert!(execution.success);
    assert_eq!(std::fs::read_to_string(project.path().join("to.txt")).unwrap(), "already here");
    assert!(execution.step_results[0].files_created.is_empty());
}

// HYPERGEN_OVERWRITE is process-global; serialize against every other test
// in this binary that touches it, the same way hypergen-tools's own
// env_overwrite test does.
#[tokio::test]
#[serial_test::serial]
async fn env_overwrite_forces_existing_target_to_be_replaced() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("to.txt.jig"), "Hello {{ name }}!").unwrap();
    std::fs::write(project.path().join("to.txt"), "stale").unwrap();

    let recipe_yaml = r#"
name: greet
variables:
  name:
    type: string
    default: world
steps:
  - name: write
    tool: template
    template: to.txt.jig
"#;
    let recipe_path = write_recipe(project.path(), recipe_yaml);
    let engine = engine();

    std::env::set_var("HYPERGEN_OVERWRITE", "1");
    let options = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
    let execution = engine.execute_recipe(RecipeSource::File(recipe_path), options).await.unwrap();
    std::env::remove_var("HYPERGEN_OVERWRITE");

    assert!(execution.success);
    assert_eq!(std::fs::read_to_string(project.path().join("to.txt")).unwrap(), "Hello world!");
    assert_eq!(execution.step_results[0].files_created.len(), 1);
}

#[tokio::test]
async fn nested_sequence_and_parallel_steps_count_leaves_not_containers() {
    let project = tempfile::tempdir().unwrap();
    for n in 1..=8 {
        std::fs::write(project.path().join(format!("t{n}.jig")), format!("file {n}")).unwrap();
    }

    let recipe_yaml = r#"
name: batch
steps:
  - name: group-a
    tool: sequence
    steps:
      - name: a1
        tool: template
        template: t1.jig
        outputDir: out/a
      - name: a2
        tool: template
        template: t2.jig
        outputDir: out/a
      - name: a3
        tool: template
        template: t3.jig
        outputDir: out/a
  - name: group-b
    tool: sequence
    steps:
      - name: b1
        tool: template
        template: t4.jig
        outputDir: out/b
      - name: b2
        tool: template
        template: t5.jig
        outputDir: out/b
      - name: b3
        tool: template
        template: t6.jig
        outputDir: out/b
  - name: group-c
    tool: sequence
    steps:
      - name: c1
        tool: template
        template: t7.jig
        outputDir: out/c
      - name: c2
        tool: template
        template: t8.jig
        outputDir: out/c
"#;
    let recipe_path = write_recipe(project.path(), recipe_yaml);
    let engine = engine();
    let options = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
    let execution = engine.execute_recipe(RecipeSource::File(recipe_path), options).await.unwrap();

    assert!(execution.success);
    assert_eq!(execution.step_results.len(), 3);
    assert_eq!(execution.metadata.completed_steps, 8);
    assert_eq!(execution.metadata.total_steps, 8);
}

#[tokio::test]
async fn when_expression_gates_on_filesystem_helpers() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("package.json"), "{}").unwrap();
    std::fs::create_dir(project.path().join("src")).unwrap();
    std::fs::write(project.path().join("ok.jig"), "ok").unwrap();

    let recipe_yaml = r#"
name: conditional
steps:
  - name: gated
    tool: template
    template: ok.jig
    when: "fileExists('package.json') && dirExists('src')"
"#;
    let recipe_path = write_recipe(project.path(), recipe_yaml);
    let engine = engine();
    let options = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
    let execution = engine.execute_recipe(RecipeSource::File(recipe_path), options).await.unwrap();
    assert!(execution.success);
    assert_eq!(execution.step_results[0].status, hypergen_core::result::StepStatus::Completed);
    assert!(project.path().join("ok").exists());
}

#[tokio::test]
async fn when_expression_skips_the_step_if_a_directory_is_missing() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("package.json"), "{}").unwrap();
    std::fs::write(project.path().join("ok.jig"), "ok").unwrap();

    let recipe_yaml = r#"
name: conditional
steps:
  - name: gated
    tool: template
    template: ok.jig
    when: "fileExists('package.json') && dirExists('src')"
"#;
    let recipe_path = write_recipe(project.path(), recipe_yaml);
    let engine = engine();
    let options = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
    let execution = engine.execute_recipe(RecipeSource::File(recipe_path), options).await.unwrap();
    assert!(execution.success);
    assert_eq!(execution.step_results[0].status, hypergen_core::result::StepStatus::Skipped);
    assert!(!project.path().join("ok").exists());
}

#[tokio::test]
async fn parallel_step_with_one_continue_on_error_child_still_completes() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("a.jig"), "a").unwrap();
    std::fs::write(project.path().join("b.jig"), "b").unwrap();

    let recipe_yaml = r#"
name: fanout
steps:
  - name: fanout
    tool: parallel
    steps:
      - name: ok-a
        tool: template
        template: a.jig
      - name: ok-b
        tool: template
        template: b.jig
      - name: broken
        tool: codemod
        codemod: no-such-transform
        files: ["a.jig"]
        continueOnError: true
"#;
    let recipe_path = write_recipe(project.path(), recipe_yaml);
    let engine = engine();
    let options = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
    let execution = engine.execute_recipe(RecipeSource::File(recipe_path), options).await.unwrap();

    assert!(execution.success);
    assert_eq!(execution.metadata.completed_steps, 2);
    assert_eq!(execution.metadata.failed_steps, 1);
}

#[tokio::test]
async fn idempotent_injection_does_not_duplicate_content_on_a_second_run() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(
        project.path().join("target.txt"),
        "line one\n// MARKER\nline two\n",
    )
    .unwrap();
    std::fs::write(
        project.path().join("snippet.jig"),
        "---\nto: target.txt\ninject: true\nafter: \"// MARKER\"\n---\ninserted line\n",
    )
    .unwrap();

    let recipe_yaml = r#"
name: inject-once
steps:
  - name: inject
    tool: template
    template: snippet.jig
"#;
    let recipe_path = write_recipe(project.path(), recipe_yaml);
    let engine = engine();

    let options1 = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
    engine.execute_recipe(RecipeSource::File(recipe_path.clone()), options1).await.unwrap();
    let after_first = std::fs::read_to_string(project.path().join("target.txt")).unwrap();
    assert_eq!(after_first.matches("inserted line").count(), 1);

    let options2 = EngineOptions { working_dir: project.path().to_path_buf(), ..Default::default() };
    engine.execute_recipe(RecipeSource::File(recipe_path), options2).await.unwrap();
    let after_second = std::fs::read_to_string(project.path().join("target.txt")).unwrap();
    assert_eq!(after_second, after_first);
}
