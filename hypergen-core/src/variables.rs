//! ABOUTME: The variable bag threaded through recipe/step/context layers
//! ABOUTME: Implements the shadowing merge rule: step ⊕ context ⊕ recipe

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A flat map of variable name to JSON value, the common currency between
/// recipe defaults, CLI-supplied values, step `variables:`, and tool
/// exports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variables(HashMap<String, Value>);

impl Variables {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &HashMap<String, Value> {
        &self.0
    }

    /// Merge `other` on top of `self`, `other`'s entries taking precedence.
    /// This is the single merge primitive used for every layering rule in
    /// the spec: kit ⊕ cookbook ⊕ recipe ⊕ CLI at the engine level, and
    /// recipe ⊕ context ⊕ step at the per-step level.
    pub fn merged_with(&self, other: &Variables) -> Variables {
        let mut merged = self.0.clone();
        for (k, v) in &other.0 {
            merged.insert(k.clone(), v.clone());
        }
        Variables(merged)
    }

    pub fn merge_from(&mut self, other: &Variables) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Render-context view: `{result, step, status, ...variables}` used by
    /// the Output Evaluator (spec.md §4.9).
    pub fn to_json_object(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }
}

impl From<HashMap<String, Value>> for Variables {
    fn from(map: HashMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Variables {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
