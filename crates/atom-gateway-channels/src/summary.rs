//! Terminal-task summarization.
//!
//! Maps the runtime's terminal-status taxonomy onto a single user-visible
//! string. Successful tasks with output become an assistant reply;
//! everything else becomes a system notice or an error notice.

use atom_gateway_types::{TaskSnapshot, TaskStatus};

/// Stop reasons the runtime uses for graceful non-success. These map to a
/// system notice rather than an error.
const CONTROLLED_STOP_REASONS: [&str; 6] = [
    "tool_budget_exhausted",
    "step_limit_segment_continue",
    "model_step_budget_exhausted",
    "continuation_limit_reached",
    "tool_policy_blocked",
    "intent_execution_failed",
];

/// The outcome of summarizing one terminal task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCompletion {
    /// The task succeeded and produced output to relay verbatim.
    AssistantReply {
        /// The task result, delivered as the reply.
        reply_text: String,
        /// Short status line, e.g. `Reply received (5 chars)`.
        status_notice: String,
    },
    /// The task ended without output, in a controlled or expected way.
    System {
        /// The notice shown to the user.
        status_notice: String,
    },
    /// The task failed.
    Error {
        /// The notice shown to the user.
        status_notice: String,
    },
}

impl TaskCompletion {
    /// The text to deliver to the user: the reply for assistant replies,
    /// the status notice otherwise.
    pub fn user_reply(&self) -> &str {
        match self {
            TaskCompletion::AssistantReply { reply_text, .. } => reply_text,
            TaskCompletion::System { status_notice } => status_notice,
            TaskCompletion::Error { status_notice } => status_notice,
        }
    }
}

/// Classify a terminal [`TaskSnapshot`].
pub fn summarize_terminal_task(task: &TaskSnapshot) -> TaskCompletion {
    match &task.status {
        TaskStatus::Success => match &task.result {
            Some(result) => TaskCompletion::AssistantReply {
                reply_text: result.clone(),
                status_notice: format!("Reply received ({} chars)", result.chars().count()),
            },
            None => TaskCompletion::System {
                status_notice: "Task succeeded with empty result.".to_string(),
            },
        },
        TaskStatus::Failed => summarize_failed(task),
        TaskStatus::Cancelled => TaskCompletion::System {
            status_notice: "Task was cancelled.".to_string(),
        },
        other => TaskCompletion::System {
            status_notice: format!("Task completed with unexpected status: {other}"),
        },
    }
}

fn summarize_failed(task: &TaskSnapshot) -> TaskCompletion {
    if let Some(exec) = task.execution()
        && exec.completed == Some(false)
        && let Some(reason) = exec.stop_reason.as_deref()
        && CONTROLLED_STOP_REASONS.contains(&reason)
    {
        let mut stats = Vec::new();
        if let Some(n) = exec.total_tool_calls {
            stats.push(format!("tools {n}"));
        }
        if let Some(n) = exec.total_model_steps {
            stats.push(format!("model steps {n}"));
        }
        if let Some(n) = exec.segment_count {
            stats.push(format!("segments {n}"));
        }

        let reason = reason.replace('_', " ");
        let status_notice = if stats.is_empty() {
            format!("Task not completed: {reason}")
        } else {
            format!("Task not completed: {reason} ({})", stats.join(", "))
        };
        return TaskCompletion::System { status_notice };
    }

    let message = task
        .error
        .as_ref()
        .map(|e| e.message.as_str())
        .unwrap_or("Unknown error");
    TaskCompletion::Error {
        status_notice: format!("Task failed: {message}"),
    }
}
