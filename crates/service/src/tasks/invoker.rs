use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use super::broker::TaskBroker;
use super::errors::TaskError;
use super::message::TaskMessage;
use super::registry::TaskRegistry;
use crate::scheduler::{ScheduleSource, ScheduledTask};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InvokeOutcome {
    Queued { task_id: String },
    Scheduled { task_id: String, schedule_id: String, run_at: DateTime<Utc> },
}

impl InvokeOutcome {
    pub fn task_id(&self) -> &str {
        match self {
            InvokeOutcome::Queued { task_id } | InvokeOutcome::Scheduled { task_id, .. } => task_id,
        }
    }
}

/// Sends registered tasks by name: straight to the broker, or as a one-shot schedule when delayed.
#[derive(Clone)]
pub struct TaskInvoker {
    broker: Arc<dyn TaskBroker>,
    registry: Arc<TaskRegistry>,
    schedules: Arc<dyn ScheduleSource>,
}

impl TaskInvoker {
    pub fn new(broker: Arc<dyn TaskBroker>, registry: Arc<TaskRegistry>, schedules: Arc<dyn ScheduleSource>) -> Self {
        Self { broker, registry, schedules }
    }

    pub fn broker(&self) -> Arc<dyn TaskBroker> {
        self.broker.clone()
    }

    /// `data` is passed to the handler as `kwargs.data`.
    #[instrument(skip(self, data))]
    pub async fn invoke(&self, task_name: &str, data: Value, delay: Option<Duration>) -> Result<InvokeOutcome, TaskError> {
        if task_name.trim().is_empty() {
            return Err(TaskError::EmptyName);
        }
        if !self.registry.contains(task_name) {
            return Err(TaskError::UnknownTask(task_name.to_string()));
        }
        let mut kwargs = Map::new();
        kwargs.insert("data".into(), data);

        match delay {
            None => {
                let msg = TaskMessage::new(task_name).with_kwargs(kwargs);
                let task_id = msg.task_id.clone();
                self.broker.kick(msg).await?;
                info!(event = "task_queued", task_id = %task_id, "task queued");
                Ok(InvokeOutcome::Queued { task_id })
            }
            Some(delay) => {
                let offset = chrono::Duration::from_std(delay).map_err(|e| TaskError::Handler(e.to_string()))?;
                let run_at = Utc::now() + offset;
                let task_id = Uuid::new_v4().simple().to_string();
                let schedule = ScheduledTask::new(task_name)
                    .with_kwargs(kwargs)
                    .with_task_id(task_id.clone())
                    .at(run_at);
                let schedule_id = schedule.schedule_id.clone();
                self.schedules.add_schedule(schedule).await?;
                info!(event = "task_scheduled", task_id = %task_id, schedule_id = %schedule_id, run_at = %run_at, "task scheduled");
                Ok(InvokeOutcome::Scheduled { task_id, schedule_id, run_at })
            }
        }
    }
}
