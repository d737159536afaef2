use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use super::errors::ScheduleError;
use super::scheduled_task::ScheduledTask;
use super::source::ScheduleSource;
use crate::tasks::TaskRegistry;

/// Serializable view of a schedule record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub task_name: String,
    pub schedule_id: String,
    pub cron: Option<String>,
    pub labels: Map<String, Value>,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub task_id: Option<String>,
    pub time: Option<String>,
    pub interval: Option<String>,
}

impl From<&ScheduledTask> for TaskInfo {
    fn from(t: &ScheduledTask) -> Self {
        Self {
            task_name: t.task_name.clone(),
            schedule_id: t.schedule_id.clone(),
            cron: t.cron.clone(),
            labels: t.labels.clone(),
            args: t.args.clone(),
            kwargs: t.kwargs.clone(),
            task_id: t.task_id.clone(),
            time: t.time.map(|d| d.to_rfc3339()),
            interval: t.interval.map(|i| i.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddScheduleResponse {
    pub success: bool,
    pub message: String,
    pub task_info: Option<TaskInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveScheduleResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListSchedulesResponse {
    pub success: bool,
    pub message: String,
    pub tasks: Vec<TaskInfo>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetScheduleResponse {
    pub success: bool,
    pub message: String,
    pub task_info: Option<TaskInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearSchedulesResponse {
    pub success: bool,
    pub message: String,
    pub cleared_count: u64,
}

/// Runtime management of the dynamic schedule source.
///
/// Failures are reported in the returned envelope, not as `Err`.
#[derive(Clone)]
pub struct SchedulerService {
    source: Arc<dyn ScheduleSource>,
    registry: Arc<TaskRegistry>,
}

impl SchedulerService {
    pub fn new(source: Arc<dyn ScheduleSource>, registry: Arc<TaskRegistry>) -> Self {
        Self { source, registry }
    }

    pub fn source(&self) -> Arc<dyn ScheduleSource> {
        self.source.clone()
    }

    /// Validate against the registry, then persist.
    pub async fn add(&self, task: ScheduledTask) -> Result<(), ScheduleError> {
        if !self.registry.contains(&task.task_name) {
            return Err(ScheduleError::UnknownTask(task.task_name));
        }
        self.source.add_schedule(task).await
    }

    #[instrument(skip(self, task), fields(task_name = %task.task_name, schedule_id = %task.schedule_id))]
    pub async fn add_scheduled_task(&self, task: ScheduledTask) -> AddScheduleResponse {
        let info = TaskInfo::from(&task);
        match self.add(task).await {
            Ok(()) => {
                info!(event = "schedule_added", "scheduled task registered");
                AddScheduleResponse {
                    success: true,
                    message: format!("Scheduled task '{}' registered successfully", info.task_name),
                    task_info: Some(info),
                }
            }
            Err(e) => {
                warn!(error = %e, "schedule rejected");
                AddScheduleResponse {
                    success: false,
                    message: format!("Failed to register scheduled task: {e}"),
                    task_info: None,
                }
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn remove_scheduled_task(&self, schedule_id: &str) -> RemoveScheduleResponse {
        match self.source.delete_schedule(schedule_id).await {
            Ok(()) => RemoveScheduleResponse {
                success: true,
                message: format!("Scheduled task with ID '{schedule_id}' removed successfully"),
            },
            Err(ScheduleError::NotFound(_)) => RemoveScheduleResponse {
                success: false,
                message: format!("Scheduled task with ID '{schedule_id}' not found"),
            },
            Err(e) => RemoveScheduleResponse {
                success: false,
                message: format!("Failed to remove scheduled task: {e}"),
            },
        }
    }

    pub async fn list_scheduled_tasks(&self) -> ListSchedulesResponse {
        match self.source.get_schedules().await {
            Ok(tasks) => {
                let tasks: Vec<TaskInfo> = tasks.iter().map(TaskInfo::from).collect();
                ListSchedulesResponse {
                    success: true,
                    message: format!("Retrieved {} scheduled tasks successfully", tasks.len()),
                    count: tasks.len(),
                    tasks,
                }
            }
            Err(e) => ListSchedulesResponse {
                success: false,
                message: format!("Failed to retrieve scheduled tasks: {e}"),
                tasks: Vec::new(),
                count: 0,
            },
        }
    }

    pub async fn get_scheduled_task(&self, schedule_id: &str) -> GetScheduleResponse {
        match self.source.get_schedule_by_id(schedule_id).await {
            Ok(Some(task)) => GetScheduleResponse {
                success: true,
                message: format!("Retrieved scheduled task '{}' successfully", task.task_name),
                task_info: Some(TaskInfo::from(&task)),
            },
            Ok(None) => GetScheduleResponse {
                success: false,
                message: format!("Scheduled task with ID '{schedule_id}' not found"),
                task_info: None,
            },
            Err(e) => GetScheduleResponse {
                success: false,
                message: format!("Failed to retrieve scheduled task: {e}"),
                task_info: None,
            },
        }
    }

    #[instrument(skip(self))]
    pub async fn clear_all_scheduled_tasks(&self) -> ClearSchedulesResponse {
        match self.source.clear_all_schedules().await {
            Ok(count) => ClearSchedulesResponse {
                success: true,
                message: format!("Cleared {count} scheduled tasks successfully"),
                cleared_count: count,
            },
            Err(e) => ClearSchedulesResponse {
                success: false,
                message: format!("Failed to clear scheduled tasks: {e}"),
                cleared_count: 0,
            },
        }
    }

    pub async fn get_scheduled_task_count(&self) -> Result<u64, ScheduleError> {
        self.source.schedule_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::LogMailer;
    use crate::scheduler::MemoryScheduleSource;

    fn service() -> SchedulerService {
        let registry = Arc::new(TaskRegistry::with_builtins(Arc::new(LogMailer::new("x@y.io"))));
        SchedulerService::new(Arc::new(MemoryScheduleSource::new()), registry)
    }

    #[tokio::test]
    async fn add_list_get_remove_clear() {
        let svc = service();
        let task = ScheduledTask::new("mail_now").with_schedule_id("s1").with_cron("*/1 * * * *").with_label("task-type", "schedule");
        let added = svc.add_scheduled_task(task).await;
        assert!(added.success);
        assert_eq!(added.message, "Scheduled task 'mail_now' registered successfully");
        assert_eq!(added.task_info.unwrap().cron.as_deref(), Some("*/1 * * * *"));

        let listed = svc.list_scheduled_tasks().await;
        assert_eq!(listed.count, 1);
        assert_eq!(listed.message, "Retrieved 1 scheduled tasks successfully");

        let got = svc.get_scheduled_task("s1").await;
        assert!(got.success);
        assert_eq!(got.message, "Retrieved scheduled task 'mail_now' successfully");

        let removed = svc.remove_scheduled_task("s1").await;
        assert!(removed.success);
        let again = svc.remove_scheduled_task("s1").await;
        assert!(!again.success);
        assert_eq!(again.message, "Scheduled task with ID 's1' not found");

        let missing = svc.get_scheduled_task("s1").await;
        assert!(!missing.success && missing.task_info.is_none());

        svc.add_scheduled_task(ScheduledTask::new("heartbeat").every(5)).await;
        svc.add_scheduled_task(ScheduledTask::new("heartbeat").every(7)).await;
        assert_eq!(svc.get_scheduled_task_count().await.unwrap(), 2);
        let cleared = svc.clear_all_scheduled_tasks().await;
        assert_eq!(cleared.cleared_count, 2);
        assert_eq!(cleared.message, "Cleared 2 scheduled tasks successfully");
    }

    #[tokio::test]
    async fn rejects_unregistered_and_invalid_tasks() {
        let svc = service();
        let res = svc.add_scheduled_task(ScheduledTask::new("nope").every(5)).await;
        assert!(!res.success);
        assert_eq!(res.message, "Failed to register scheduled task: task 'nope' is not registered");

        let res = svc.add_scheduled_task(ScheduledTask::new("mail_now").with_cron("not cron")).await;
        assert!(!res.success);
        assert!(res.message.starts_with("Failed to register scheduled task: invalid cron expression"));
        assert_eq!(svc.get_scheduled_task_count().await.unwrap(), 0);
    }
}
