//! ABOUTME: `StepResult`, `ToolResult`, and aggregated `ExecutionMetadata`
//! ABOUTME: The record types the executor and engine accumulate during a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

/// Discriminated per-tool-kind result payload. Each tool's `execute`
/// returns the variant matching its own discriminant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "camelCase")]
pub enum ToolResult {
    Template {
        template_name: String,
        template_path: String,
        engine: String,
        files_generated: Vec<String>,
        variables: HashMap<String, Value>,
        skipped: Option<SkipReason>,
    },
    Action {
        success: bool,
        message: String,
        files_created: Vec<String>,
        files_modified: Vec<String>,
        files_deleted: Vec<String>,
        data: Option<Value>,
    },
    CodeMod {
        files_transformed: Vec<String>,
        backups: Vec<String>,
    },
    Recipe {
        provides: HashMap<String, Value>,
    },
    Shell {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    Prompt {
        value: Value,
    },
    Install {
        package_manager: String,
        installed: Vec<String>,
        skipped: bool,
    },
    Query {
        checks_passed: bool,
        exported: HashMap<String, Value>,
    },
    Patch {
        file: String,
        created: bool,
    },
    EnsureDirs {
        paths: Vec<String>,
        created: Vec<String>,
        already_existed: Vec<String>,
    },
    Sequence {
        steps: Vec<StepResult>,
    },
    Parallel {
        steps: Vec<StepResult>,
    },
    Ai {
        key: String,
        status: AiResolutionStatus,
        answer: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiResolutionStatus {
    Deferred,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Exists,
    ConditionFalse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub status: StepStatus,
    pub step_name: String,
    pub tool_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub retry_count: u32,
    pub dependencies_satisfied: bool,
    pub condition_result: Option<bool>,
    pub tool_result: Option<ToolResult>,
    pub files_created: Vec<String>,
    pub files_modified: Vec<String>,
    pub files_deleted: Vec<String>,
    pub error: Option<String>,
    pub output: Option<Value>,
    pub metadata: HashMap<String, Value>,
}

impl StepResult {
    pub fn pending(step_name: impl Into<String>, tool_type: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Pending,
            step_name: step_name.into(),
            tool_type: tool_type.into(),
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            retry_count: 0,
            dependencies_satisfied: true,
            condition_result: None,
            tool_result: None,
            files_created: vec![],
            files_modified: vec![],
            files_deleted: vec![],
            error: None,
            output: None,
            metadata: HashMap::new(),
        }
    }

    /// Finalize the result: sets `end_time`/`duration_ms`, enforcing the
    /// `endTime >= startTime` invariant from spec.md §3 by clamping.
    pub fn finish(mut self, status: StepStatus) -> Self {
        let end = Utc::now().max(self.start_time);
        self.duration_ms = Some((end - self.start_time).num_milliseconds());
        self.end_time = Some(end);
        self.status = status;
        self
    }

    pub fn is_leaf_completed(&self) -> bool {
        matches!(self.status, StepStatus::Completed)
    }

    /// Count leaves recursively: `Sequence`/`Parallel` results contribute
    /// their children's leaves, not themselves, per spec.md §3's
    /// "including those inside nested sequences and parallel blocks".
    pub fn count_leaves(&self) -> ExecutionCounts {
        if let Some(ToolResult::Sequence { steps } | ToolResult::Parallel { steps }) =
            &self.tool_result
        {
            let mut counts = ExecutionCounts::default();
            for child in steps {
                counts += child.count_leaves();
            }
            counts
        } else {
            let mut counts = ExecutionCounts::default();
            match self.status {
                StepStatus::Completed => counts.completed = 1,
                StepStatus::Failed => counts.failed = 1,
                StepStatus::Skipped => counts.skipped = 1,
                StepStatus::Cancelled => counts.cancelled = 1,
                StepStatus::Pending | StepStatus::Running => {}
            }
            counts.total = 1;
            counts
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExecutionCounts {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub cancelled: u64,
}

impl std::ops::AddAssign for ExecutionCounts {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.completed += other.completed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.cancelled += other.cancelled;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContextInfo {
    pub working_dir: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub total_steps: u64,
    pub completed_steps: u64,
    pub failed_steps: u64,
    pub skipped_steps: u64,
    pub cancelled_steps: u64,
    pub peak_memory_bytes: Option<u64>,
    pub context: ExecutionContextInfo,
}

impl ExecutionMetadata {
    /// Aggregate from the top-level step results, counting nested
    /// Sequence/Parallel leaves per spec.md's invariant.
    pub fn from_results(results: &[StepResult], working_dir: impl Into<String>) -> Self {
        let mut counts = ExecutionCounts::default();
        for result in results {
            counts += result.count_leaves();
        }
        Self {
            total_steps: counts.total,
            completed_steps: counts.completed,
            failed_steps: counts.failed,
            skipped_steps: counts.skipped,
            cancelled_steps: counts.cancelled,
            peak_memory_bytes: None,
            context: ExecutionContextInfo {
                working_dir: working_dir.into(),
                user_id: None,
                session_id: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(status: StepStatus) -> StepResult {
        StepResult::pending("leaf", "template").finish(status)
    }

    #[test]
    fn nested_sequence_leaves_are_counted_not_the_container() {
        let nested = StepResult {
            tool_result: Some(ToolResult::Sequence {
                steps: vec![leaf(StepStatus::Completed), leaf(StepStatus::Completed)],
            }),
            ..StepResult::pending("outer", "sequence").finish(StepStatus::Completed)
        };
        let parallel = StepResult {
            tool_result: Some(ToolResult::Parallel {
                steps: vec![leaf(StepStatus::Completed), leaf(StepStatus::Failed)],
            }),
            ..StepResult::pending("par", "parallel").finish(StepStatus::Completed)
        };

        let metadata = ExecutionMetadata::from_results(&[nested, parallel], "/tmp/project");
        assert_eq!(metadata.total_steps, 4);
        assert_eq!(metadata.completed_steps, 3);
        assert_eq!(metadata.failed_steps, 1);
    }

    #[test]
    fn end_time_never_precedes_start_time() {
        let result = StepResult::pending("s", "shell").finish(StepStatus::Completed);
        assert!(result.end_time.unwrap() >= result.start_time);
        assert_eq!(
            result.duration_ms,
            Some((result.end_time.unwrap() - result.start_time).num_milliseconds())
        );
    }
}
