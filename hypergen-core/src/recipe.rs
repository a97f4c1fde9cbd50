//! ABOUTME: The `Recipe` document model: variables schema, steps, hooks, composition
//! ABOUTME: Loaded from YAML by the engine crate; validated here for structural invariants

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::error::{HypergenError, Result};
use crate::step::Step;

/// One entry of a recipe's `variables:` schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSpec {
    #[serde(rename = "type")]
    pub var_type: String,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub validate: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecipeHooks {
    #[serde(default, rename = "beforeRecipe")]
    pub before_recipe: Vec<String>,
    #[serde(default, rename = "afterRecipe")]
    pub after_recipe: Vec<String>,
    #[serde(default, rename = "beforeStep")]
    pub before_step: Vec<String>,
    #[serde(default, rename = "afterStep")]
    pub after_step: Vec<String>,
    #[serde(default, rename = "onError")]
    pub on_error: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecipeComposition {
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub includes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecipeSteps {
    #[serde(default)]
    pub pre: Vec<Step>,
    #[serde(default)]
    pub post: Vec<Step>,
}

/// A named, versioned declaration of work: variables schema plus an
/// ordered list of steps, per spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, VariableSpec>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub provides: HashMap<String, String>,
    #[serde(default)]
    pub hooks: RecipeHooks,
    #[serde(default, rename = "onSuccess")]
    pub on_success: Option<String>,
    #[serde(default, rename = "onError")]
    pub on_error: Option<String>,
    #[serde(default)]
    pub composition: RecipeComposition,
    #[serde(default)]
    pub settings: HashMap<String, Value>,
    /// Pre/post steps around the Automatic Template Processing pass
    /// (spec.md §4.12). Named `templateSteps` in YAML to avoid colliding
    /// with the top-level `steps:` array.
    #[serde(default, rename = "templateSteps")]
    pub template_steps: Option<RecipeSteps>,
}

impl Recipe {
    /// Parse a recipe from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            HypergenError::config(format!("failed to parse recipe YAML: {e}"))
                .with_suggestion("check indentation and the `tool:` discriminant of each step")
        })
    }

    /// Structural validation independent of the filesystem: unique step
    /// names, a `dependsOn` graph that is acyclic and only references
    /// known steps, per spec.md invariants in §3 and §8.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(HypergenError::config(format!(
                    "duplicate step name '{}'",
                    step.name
                )));
            }
        }

        let names: HashSet<&str> = self.steps.iter().map(|s| s.name.as_str()).collect();
        for step in &self.steps {
            for dep in &step.depends_on {
                if !names.contains(dep.as_str()) {
                    return Err(HypergenError::config(format!(
                        "step '{}' depends on unknown step '{}'",
                        step.name, dep
                    )));
                }
            }
        }

        detect_cycle(&self.steps)?;
        Ok(())
    }
}

/// Kahn's algorithm cycle detection over the top-level `dependsOn` graph.
fn detect_cycle(steps: &[Step]) -> Result<()> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

    for step in steps {
        in_degree.entry(step.name.as_str()).or_insert(0);
        for dep in &step.depends_on {
            adjacency
                .entry(dep.as_str())
                .or_default()
                .push(step.name.as_str());
            *in_degree.entry(step.name.as_str()).or_insert(0) += 1;
        }
    }

    let mut queue: Vec<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut visited = 0usize;

    while let Some(node) = queue.pop() {
        visited += 1;
        if let Some(children) = adjacency.get(node) {
            for child in children {
                let degree = in_degree.get_mut(child).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    queue.push(child);
                }
            }
        }
    }

    if visited != steps.len() {
        return Err(HypergenError::config(
            "recipe contains a circular dependsOn dependency",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{StepKind, TemplateStep};

    fn template_step(name: &str, deps: Vec<&str>) -> Step {
        Step {
            name: name.into(),
            description: None,
            when: None,
            depends_on: deps.into_iter().map(String::from).collect(),
            parallel: false,
            continue_on_error: false,
            timeout_ms: None,
            retries: 0,
            variables: HashMap::new(),
            environment: HashMap::new(),
            exports: HashMap::new(),
            kind: StepKind::Template(TemplateStep {
                template: format!("{name}.jig"),
                output_dir: None,
                overwrite: None,
                exclude: vec![],
            }),
        }
    }

    #[test]
    fn rejects_duplicate_step_names() {
        let recipe = Recipe {
            name: "r".into(),
            description: None,
            version: None,
            author: None,
            variables: HashMap::new(),
            steps: vec![template_step("a", vec![]), template_step("a", vec![])],
            provides: HashMap::new(),
            hooks: RecipeHooks::default(),
            on_success: None,
            on_error: None,
            composition: RecipeComposition::default(),
            settings: HashMap::new(),
            template_steps: None,
        };
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn rejects_cycles() {
        let mut a = template_step("a", vec!["b"]);
        let b = template_step("b", vec!["a"]);
        a.depends_on = vec!["b".into()];
        let recipe = Recipe {
            name: "r".into(),
            description: None,
            version: None,
            author: None,
            variables: HashMap::new(),
            steps: vec![a, b],
            provides: HashMap::new(),
            hooks: RecipeHooks::default(),
            on_success: None,
            on_error: None,
            composition: RecipeComposition::default(),
            settings: HashMap::new(),
            template_steps: None,
        };
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn accepts_valid_dag() {
        let a = template_step("a", vec![]);
        let b = template_step("b", vec!["a"]);
        let c = template_step("c", vec!["a", "b"]);
        let recipe = Recipe {
            name: "r".into(),
            description: None,
            version: None,
            author: None,
            variables: HashMap::new(),
            steps: vec![a, b, c],
            provides: HashMap::new(),
            hooks: RecipeHooks::default(),
            on_success: None,
            on_error: None,
            composition: RecipeComposition::default(),
            settings: HashMap::new(),
            template_steps: None,
        };
        assert!(recipe.validate().is_ok());
    }
}
