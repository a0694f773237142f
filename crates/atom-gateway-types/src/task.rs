//! Runtime task snapshots.
//!
//! Models the subset of the task runtime's API the gateway consumes:
//! a [`TaskSnapshot`] with its status, optional result text, error, and
//! execution metadata. The shapes mirror the runtime's JSON (camelCase).

use serde::{Deserialize, Serialize};

/// Task status as reported by the runtime.
///
/// The runtime's taxonomy is open-ended; statuses this crate does not know
/// about deserialize into [`TaskStatus::Other`] so callers can still report
/// them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
    #[serde(untagged)]
    Other(String),
}

impl TaskStatus {
    /// True while the task has not reached a terminal state.
    pub fn is_still_running(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    /// The status string as the runtime spells it.
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Other(s) => s,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error details attached to a failed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    /// Human-readable failure message.
    pub message: String,
    /// Stack trace, when the runtime captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Execution statistics the runtime attaches under `metadata.execution`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetadata {
    /// Whether the agent run ran to natural completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// Why execution stopped, for non-completed runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Number of execution segments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_count: Option<u64>,
    /// Total tool invocations across the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tool_calls: Option<u64>,
    /// Total model steps across the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_model_steps: Option<u64>,
    /// Whether an automatic retry was suppressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_suppressed: Option<bool>,
}

/// Task metadata envelope.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Execution statistics, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionMetadata>,
}

/// A snapshot of one runtime task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Runtime task identifier.
    pub id: String,
    /// Task type (e.g. `message_gateway.input`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    /// Current status.
    pub status: TaskStatus,
    /// Result text, present for successful tasks that produced output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Error details, present for failed tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    /// Metadata envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TaskMetadata>,
}

impl TaskSnapshot {
    /// The execution metadata, when both envelopes are present.
    pub fn execution(&self) -> Option<&ExecutionMetadata> {
        self.metadata.as_ref().and_then(|m| m.execution.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_still_running() {
        assert!(TaskStatus::Pending.is_still_running());
        assert!(TaskStatus::Running.is_still_running());
        assert!(!TaskStatus::Success.is_still_running());
        assert!(!TaskStatus::Failed.is_still_running());
        assert!(!TaskStatus::Cancelled.is_still_running());
        assert!(!TaskStatus::Other("paused".into()).is_still_running());
    }

    #[test]
    fn status_deserializes_known_and_unknown() {
        let s: TaskStatus = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(s, TaskStatus::Running);

        let s: TaskStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(s, TaskStatus::Other("paused".into()));
        assert_eq!(s.as_str(), "paused");
    }

    #[test]
    fn snapshot_deserializes_full_shape() {
        let json = r#"{
            "id": "task-1",
            "type": "message_gateway.input",
            "status": "failed",
            "error": {"message": "boom", "stack": "at line 1"},
            "metadata": {
                "execution": {
                    "completed": false,
                    "stopReason": "tool_budget_exhausted",
                    "totalToolCalls": 7,
                    "segmentCount": 2
                }
            }
        }"#;
        let snap: TaskSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.status, TaskStatus::Failed);
        assert_eq!(snap.error.as_ref().unwrap().message, "boom");
        let exec = snap.execution().unwrap();
        assert_eq!(exec.completed, Some(false));
        assert_eq!(exec.stop_reason.as_deref(), Some("tool_budget_exhausted"));
        assert_eq!(exec.total_tool_calls, Some(7));
        assert_eq!(exec.segment_count, Some(2));
        assert_eq!(exec.total_model_steps, None);
    }

    #[test]
    fn snapshot_minimal_shape() {
        let json = r#"{"id": "t", "status": "success", "result": "hello"}"#;
        let snap: TaskSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.status, TaskStatus::Success);
        assert_eq!(snap.result.as_deref(), Some("hello"));
        assert!(snap.error.is_none());
        assert!(snap.execution().is_none());
    }
}
