//! Request and response shapes of the runtime task API.

use serde::{Deserialize, Serialize};

use atom_gateway_types::TaskSnapshot;

/// Body of `POST /v1/tasks`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTaskRequest {
    /// Task input text.
    pub input: String,
    /// Scheduling priority, when the caller wants one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    /// Task type tag.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
}

impl CreateTaskRequest {
    /// A typed gateway-input task with no explicit priority.
    pub fn gateway_input(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            priority: None,
            task_type: Some(atom_gateway_types::GATEWAY_TASK_TYPE.to_string()),
        }
    }
}

/// `data` payload of a successful `POST /v1/tasks`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskResponse {
    /// Id of the created task.
    #[serde(rename = "taskId")]
    pub task_id: String,
    /// Initial snapshot of the created task.
    pub task: TaskSnapshot,
}

/// `data` payload of a successful `GET /v1/tasks/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetTaskResponse {
    /// Current snapshot of the task.
    pub task: TaskSnapshot,
    /// Transcript messages, when the runtime includes them.
    #[serde(default)]
    pub messages: Option<serde_json::Value>,
}
