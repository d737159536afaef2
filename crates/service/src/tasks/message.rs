use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A unit of work on the queue, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_id: String,
    pub task_name: String,
    #[serde(default)]
    pub labels: Map<String, Value>,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskMessage {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_id: Uuid::new_v4().simple().to_string(),
            task_name: task_name.into(),
            labels: Map::new(),
            args: Vec::new(),
            kwargs: Map::new(),
            enqueued_at: Utc::now(),
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn with_labels(mut self, labels: Map<String, Value>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }
}

/// Outcome stored by the worker under the task id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub task_name: String,
    pub is_err: bool,
    pub return_value: Option<Value>,
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_message_has_hex_id_and_empty_payload() {
        let m = TaskMessage::new("mail_now");
        assert_eq!(m.task_id.len(), 32);
        assert!(m.task_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(m.args.is_empty() && m.kwargs.is_empty() && m.labels.is_empty());
    }

    #[test]
    fn decodes_without_optional_collections() {
        let m: TaskMessage = serde_json::from_value(json!({
            "task_id": "abc",
            "task_name": "heartbeat",
            "enqueued_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(m.task_name, "heartbeat");
        assert!(m.kwargs.is_empty());
    }
}
