//! ABOUTME: Integration tests parsing full recipe documents end to end — YAML in,
//! ABOUTME: a validated `Recipe` with every step kind's discriminant out

use hypergen_core::recipe::Recipe;
use hypergen_core::step::StepKind;

const FULL_RECIPE: &str = r#"
name: scaffold-component
description: Scaffolds a React component with tests and a barrel export update
version: "1.0.0"
author: platform-team

variables:
  componentName:
    type: string
    required: true
    prompt: "Component name?"
  withTests:
    type: boolean
    default: true

hooks:
  beforeRecipe: ["logStart"]
  afterRecipe: ["logEnd"]
  onError: ["notifyFailure"]

steps:
  - name: ensure-dirs
    tool: ensureDirs
    paths: ["src/components"]

  - name: write-component
    tool: template
    template: "component.jig.t"
    outputDir: "src/components"
    dependsOn: ["ensure-dirs"]

  - name: write-tests
    tool: template
    template: "component.test.jig.t"
    outputDir: "src/components"
    when: "withTests == true"
    dependsOn: ["write-component"]

  - name: update-barrel
    tool: codemod
    codemod: "add-export"
    files: ["src/components/index.ts"]
    parameters:
      export: "export * from './{{ componentName }}';"
    dependsOn: ["write-component"]

  - name: install-deps
    tool: install
    packages: ["clsx"]
    packageManager: npm
    dependsOn: ["write-component"]

  - name: run-lint
    tool: shell
    command: "npm run lint -- --fix"
    continueOnError: true
    dependsOn: ["update-barrel"]

  - name: fan-out
    tool: parallel
    steps:
      - name: format-component
        tool: shell
        command: "prettier --write src/components"
      - name: typecheck
        tool: shell
        command: "tsc --noEmit"

  - name: compose-steps
    tool: sequence
    steps:
      - name: inner-query
        tool: query
        file: "package.json"
        checks: ["name"]
      - name: inner-patch
        tool: patch
        file: "package.json"
        merge:
          scripts:
            lint: "eslint ."

templateSteps:
  pre: []
  post: []
"#;

#[test]
fn parses_every_built_in_tool_discriminant_from_one_document() {
    let recipe = Recipe::from_yaml(FULL_RECIPE).expect("valid recipe document");
    assert_eq!(recipe.name, "scaffold-component");
    assert_eq!(recipe.steps.len(), 8);

    let kinds: Vec<&str> = recipe
        .steps
        .iter()
        .map(|s| match &s.kind {
            StepKind::EnsureDirs(_) => "ensureDirs",
            StepKind::Template(_) => "template",
            StepKind::CodeMod(_) => "codemod",
            StepKind::Install(_) => "install",
            StepKind::Shell(_) => "shell",
            StepKind::Parallel(_) => "parallel",
            StepKind::Sequence(_) => "sequence",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["ensureDirs", "template", "template", "codemod", "install", "shell", "parallel", "sequence"]
    );
}

#[test]
fn valid_document_passes_structural_validation() {
    let recipe = Recipe::from_yaml(FULL_RECIPE).unwrap();
    recipe.validate().expect("dependsOn graph is acyclic and fully resolvable");
}

#[test]
fn nested_sequence_and_parallel_children_are_not_flattened_into_top_level_steps() {
    let recipe = Recipe::from_yaml(FULL_RECIPE).unwrap();
    let fan_out = recipe.steps.iter().find(|s| s.name == "fan-out").unwrap();
    match &fan_out.kind {
        StepKind::Parallel(payload) => assert_eq!(payload.steps.len(), 2),
        other => panic!("expected a parallel step, got {other:?}"),
    }

    let compose = recipe.steps.iter().find(|s| s.name == "compose-steps").unwrap();
    match &compose.kind {
        StepKind::Sequence(payload) => assert_eq!(payload.steps.len(), 2),
        other => panic!("expected a sequence step, got {other:?}"),
    }
}

#[test]
fn hooks_and_variable_schema_round_trip() {
    let recipe = Recipe::from_yaml(FULL_RECIPE).unwrap();
    assert_eq!(recipe.hooks.before_recipe, vec!["logStart".to_string()]);
    assert_eq!(recipe.hooks.on_error, vec!["notifyFailure".to_string()]);

    let component_name = recipe.variables.get("componentName").unwrap();
    assert!(component_name.required);
    let with_tests = recipe.variables.get("withTests").unwrap();
    assert_eq!(with_tests.default, Some(serde_json::Value::Bool(true)));
}

#[test]
fn unresolvable_dependency_fails_validation() {
    let yaml = r#"
name: broken
steps:
  - name: only-step
    tool: ensureDirs
    paths: ["out"]
    dependsOn: ["ghost"]
"#;
    let recipe = Recipe::from_yaml(yaml).unwrap();
    assert!(recipe.validate().is_err());
}
