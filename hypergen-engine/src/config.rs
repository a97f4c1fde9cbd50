//! ABOUTME: Engine-wide configuration: cache directory, default timeout/retry policy, and
//! ABOUTME: the export-collision strictness flag. Loaded via manual TOML parsing over a
//! ABOUTME: search-path list, mirroring the teacher's `llmspell-config` discovery pattern
//! ABOUTME: rather than the `config` crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hypergen_core::error::{HypergenError, Result};

use crate::backoff::{BackoffStrategy, JitterStrategy, RetryPolicy};

/// Discovery order for a bare `hypergen.toml`, checked relative to the
/// current working directory.
const CONFIG_SEARCH_PATHS: &[&str] = &[
    "hypergen.toml",
    ".hypergen.toml",
    "config/hypergen.toml",
    ".config/hypergen.toml",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub jitter: JitterConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JitterConfig {
    #[default]
    None,
    Full,
    Equal,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter: JitterConfig::Full,
        }
    }
}

impl RetryConfig {
    pub fn as_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: BackoffStrategy::Exponential {
                base: std::time::Duration::from_millis(self.base_delay_ms),
                multiplier: self.multiplier,
                max: std::time::Duration::from_millis(self.max_delay_ms),
            },
            jitter: match self.jitter {
                JitterConfig::None => JitterStrategy::None,
                JitterConfig::Full => JitterStrategy::Full,
                JitterConfig::Equal => JitterStrategy::Equal,
            },
        }
    }
}

/// Engine-wide settings that are not per-step (those live on `Step` itself).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Optional cache directory for parsed recipes and rendered prompt
    /// artifacts (spec.md §6). Safe to delete at any time.
    pub cache_dir: Option<PathBuf>,
    pub default_timeout_ms: u64,
    pub retry: RetryConfig,
    /// Default `Parallel` concurrency limit when a step omits `limit`.
    pub default_parallel_limit: usize,
    /// When true, a `Parallel` export-key collision is a hard failure
    /// instead of last-writer-wins-with-warning (spec.md §5(a)).
    pub strict_export_collisions: bool,
    /// Whether the engine runs the Automatic Template Processing pass for
    /// recipes that declare no explicit template steps (spec.md §4.12).
    pub automatic_template_processing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            default_timeout_ms: 5 * 60 * 1000,
            retry: RetryConfig::default(),
            default_parallel_limit: num_cpus(),
            strict_export_collisions: false,
            automatic_template_processing: true,
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

impl EngineConfig {
    /// Parse an `EngineConfig` from a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            HypergenError::config(format!("failed to parse engine config: {e}"))
                .with_suggestion("check hypergen.toml against the [retry]/[cache_dir] schema")
        })
    }

    /// Search `working_dir` for the first matching file in
    /// [`CONFIG_SEARCH_PATHS`]; returns defaults if none exist.
    pub fn load(working_dir: &Path) -> Result<Self> {
        for candidate in CONFIG_SEARCH_PATHS {
            let path = working_dir.join(candidate);
            if path.is_file() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    HypergenError::config(format!("failed to read {}: {e}", path.display()))
                })?;
                return Self::from_toml(&content);
            }
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_retry_policy() {
        let config = EngineConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 200);
        assert_eq!(config.retry.jitter, JitterConfig::Full);
    }

    #[test]
    fn load_falls_back_to_defaults_when_no_file_present() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_timeout_ms, EngineConfig::default().default_timeout_ms);
    }

    #[test]
    fn load_reads_the_first_matching_search_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hypergen.toml"), "default_timeout_ms = 9999\n").unwrap();
        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_timeout_ms, 9999);
    }
}
