//! ABOUTME: The process-scoped AI Collector singleton accumulated during Pass-1 rendering
//! ABOUTME: Must be reset at recipe boundaries to avoid cross-run leakage (spec.md §5)

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;

/// One `@ai({key})` block's accumulated data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiBlockEntry {
    pub key: String,
    pub contexts: Vec<String>,
    pub prompt: String,
    pub output_description: String,
    pub type_hint: Option<String>,
    pub examples: Vec<String>,
    pub source_file: String,
}

#[derive(Default)]
struct CollectorState {
    collect_mode: bool,
    entries: indexmap::IndexMap<String, AiBlockEntry>,
    global_contexts: Vec<String>,
}

/// Accumulates AI block entries during Pass-1 rendering. Process-scoped by
/// default (spec.md §9's "singleton collector" design note); this type is
/// also usable as an explicit handle bound at engine-run scope, which is
/// how [`crate::ai::assembler`] and the engine crate use it — the default
/// run path still goes through [`AiCollector::global`] to match the
/// teacher's ambient-singleton pattern, but nothing prevents constructing
/// a fresh instance per run for isolation (spec.md §5's "or the Collector
/// must be scoped per-run" alternative).
pub struct AiCollector {
    state: Mutex<CollectorState>,
}

impl AiCollector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CollectorState::default()),
        }
    }

    /// Process-global instance. Concurrent recipe runs in the same process
    /// must either serialize around this (the spec's default) or construct
    /// a fresh [`AiCollector::new`] per run.
    pub fn global() -> Arc<AiCollector> {
        static INSTANCE: OnceLock<Arc<AiCollector>> = OnceLock::new();
        INSTANCE.get_or_init(|| Arc::new(AiCollector::new())).clone()
    }

    /// Reset before each recipe run.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = CollectorState::default();
    }

    pub fn set_collect_mode(&self, collecting: bool) {
        self.state.lock().collect_mode = collecting;
    }

    pub fn collect_mode(&self) -> bool {
        self.state.lock().collect_mode
    }

    /// Insert or overwrite an entry. A second `add_entry` with the same key
    /// overwrites by design — the latest lexical block wins (spec.md §3).
    pub fn add_entry(&self, entry: AiBlockEntry) {
        self.state.lock().entries.insert(entry.key.clone(), entry);
    }

    pub fn has_entry(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn entries(&self) -> Vec<AiBlockEntry> {
        self.state.lock().entries.values().cloned().collect()
    }

    pub fn add_global_context(&self, context: String) {
        self.state.lock().global_contexts.push(context);
    }

    pub fn global_contexts(&self) -> Vec<String> {
        self.state.lock().global_contexts.clone()
    }

    /// Clear entries between Pass 1 and Pass 2 (collection side-effects
    /// must not leak into the resolve pass).
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.global_contexts.clear();
    }
}

impl Default for AiCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_add_entry_with_same_key_overwrites() {
        let collector = AiCollector::new();
        collector.add_entry(AiBlockEntry {
            key: "body".into(),
            prompt: "first".into(),
            ..Default::default()
        });
        collector.add_entry(AiBlockEntry {
            key: "body".into(),
            prompt: "second".into(),
            ..Default::default()
        });
        let entries = collector.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].prompt, "second");
    }

    #[test]
    fn reset_clears_entries_and_mode() {
        let collector = AiCollector::new();
        collector.set_collect_mode(true);
        collector.add_entry(AiBlockEntry {
            key: "x".into(),
            ..Default::default()
        });
        collector.reset();
        assert!(!collector.collect_mode());
        assert!(collector.entries().is_empty());
    }

    // The process-global instance is shared across every test in this binary,
    // so exercising it must be serialized or concurrent tests race each other's
    // state (spec.md §5's "serialize concurrent recipe runs" default).
    #[test]
    #[serial_test::serial]
    fn global_returns_the_same_instance_and_survives_across_calls() {
        let first = AiCollector::global();
        first.reset();
        first.add_entry(AiBlockEntry {
            key: "shared".into(),
            prompt: "from the first handle".into(),
            ..Default::default()
        });

        let second = AiCollector::global();
        assert!(second.has_entry("shared"));
        assert_eq!(second.entries()[0].prompt, "from the first handle");

        second.reset();
        assert!(AiCollector::global().entries().is_empty());
    }
}
