//! ABOUTME: Builds a topological execution order over a recipe's top-level steps
//! ABOUTME: respecting `dependsOn`; ties break on declaration order (spec.md §4.11, §8)

use std::collections::{HashMap, HashSet};

use hypergen_core::error::{HypergenError, Result};
use hypergen_core::step::Step;

/// Kahn's algorithm, preferring the earliest-declared ready step at each
/// tie so identical `dependsOn` graphs always produce identical orderings
/// (spec.md §8's "Round-trip / deterministic laws").
pub fn plan(steps: &[Step]) -> Result<Vec<usize>> {
    let index_of: HashMap<&str, usize> = steps.iter().enumerate().map(|(i, s)| (s.name.as_str(), i)).collect();

    let mut in_degree = vec![0usize; steps.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];

    for (i, step) in steps.iter().enumerate() {
        for dep in &step.depends_on {
            let Some(&dep_index) = index_of.get(dep.as_str()) else {
                return Err(HypergenError::config(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.name, dep
                )));
            };
            dependents[dep_index].push(i);
            in_degree[i] += 1;
        }
    }

    let mut ready: Vec<usize> = (0..steps.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(steps.len());
    let mut visited = HashSet::new();

    while !ready.is_empty() {
        ready.sort_unstable();
        let next = ready.remove(0);
        order.push(next);
        visited.insert(next);

        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(dependent);
            }
        }
    }

    if visited.len() != steps.len() {
        return Err(HypergenError::config("recipe contains a circular dependsOn dependency"));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypergen_core::step::{StepKind, TemplateStep};
    use std::collections::HashMap;

    fn step(name: &str, deps: &[&str]) -> Step {
        Step {
            name: name.into(),
            description: None,
            when: None,
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
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
    fn orders_by_dependency_then_declaration() {
        let steps = vec![step("c", &["a", "b"]), step("b", &["a"]), step("a", &[])];
        let order = plan(&steps).unwrap();
        let names: Vec<&str> = order.iter().map(|&i| steps[i].name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn identical_graphs_produce_identical_orderings() {
        let steps = vec![step("x", &[]), step("y", &["x"]), step("z", &["x"])];
        let order1 = plan(&steps).unwrap();
        let order2 = plan(&steps).unwrap();
        assert_eq!(order1, order2);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut a = step("a", &["b"]);
        let b = step("b", &["a"]);
        a.depends_on = vec!["b".into()];
        assert!(plan(&[a, b]).is_err());
    }
}
