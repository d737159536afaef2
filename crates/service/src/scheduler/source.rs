use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::errors::ScheduleError;
use super::scheduled_task::ScheduledTask;
use crate::tasks::TaskRegistry;

/// Where the scheduler reads schedules from and where runtime changes are written.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_schedules(&self) -> Result<Vec<ScheduledTask>, ScheduleError>;

    async fn add_schedule(&self, task: ScheduledTask) -> Result<(), ScheduleError>;

    /// `ScheduleError::NotFound` when the id is absent.
    async fn delete_schedule(&self, schedule_id: &str) -> Result<(), ScheduleError>;

    async fn get_schedule_by_id(&self, schedule_id: &str) -> Result<Option<ScheduledTask>, ScheduleError>;

    async fn list_schedule_ids(&self) -> Result<Vec<String>, ScheduleError>;

    /// Remove everything; returns how many schedules existed.
    async fn clear_all_schedules(&self) -> Result<u64, ScheduleError>;

    async fn schedule_count(&self) -> Result<u64, ScheduleError>;

    /// Called after `task` was sent. One-shot schedules are removed.
    async fn post_send(&self, task: &ScheduledTask) -> Result<(), ScheduleError> {
        if !task.is_one_shot() {
            return Ok(());
        }
        match self.delete_schedule(&task.schedule_id).await {
            Ok(()) | Err(ScheduleError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Process-local source; schedules vanish with the process.
#[derive(Default)]
pub struct MemoryScheduleSource {
    schedules: Mutex<BTreeMap<String, ScheduledTask>>,
}

impl MemoryScheduleSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, ScheduledTask>>, ScheduleError> {
        self.schedules.lock().map_err(|_| ScheduleError::Backend("schedule store lock poisoned".into()))
    }
}

#[async_trait]
impl ScheduleSource for MemoryScheduleSource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_schedules(&self) -> Result<Vec<ScheduledTask>, ScheduleError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    async fn add_schedule(&self, task: ScheduledTask) -> Result<(), ScheduleError> {
        task.validate()?;
        self.lock()?.insert(task.schedule_id.clone(), task);
        Ok(())
    }

    async fn delete_schedule(&self, schedule_id: &str) -> Result<(), ScheduleError> {
        self.lock()?
            .remove(schedule_id)
            .map(|_| ())
            .ok_or_else(|| ScheduleError::NotFound(schedule_id.to_string()))
    }

    async fn get_schedule_by_id(&self, schedule_id: &str) -> Result<Option<ScheduledTask>, ScheduleError> {
        Ok(self.lock()?.get(schedule_id).cloned())
    }

    async fn list_schedule_ids(&self) -> Result<Vec<String>, ScheduleError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn clear_all_schedules(&self) -> Result<u64, ScheduleError> {
        let mut guard = self.lock()?;
        let n = guard.len() as u64;
        guard.clear();
        Ok(n)
    }

    async fn schedule_count(&self) -> Result<u64, ScheduleError> {
        Ok(self.lock()?.len() as u64)
    }
}

/// Read-only view of the cron schedules declared on registered tasks.
pub struct LabelScheduleSource {
    schedules: Vec<ScheduledTask>,
}

impl LabelScheduleSource {
    /// Snapshot the registry; ids are `label:{task_name}:{n}` so they stay stable across restarts.
    pub fn from_registry(registry: &TaskRegistry) -> Self {
        let mut counters: BTreeMap<String, usize> = BTreeMap::new();
        let schedules = registry
            .label_schedules()
            .into_iter()
            .map(|(name, s)| {
                let n = counters.entry(name.clone()).or_default();
                let id = format!("label:{name}:{n}");
                *n += 1;
                let mut task = ScheduledTask::new(name).with_schedule_id(id).with_cron(s.cron);
                task.labels = s.labels;
                task
            })
            .collect();
        Self { schedules }
    }
}

#[async_trait]
impl ScheduleSource for LabelScheduleSource {
    fn name(&self) -> &'static str {
        "label"
    }

    async fn get_schedules(&self) -> Result<Vec<ScheduledTask>, ScheduleError> {
        Ok(self.schedules.clone())
    }

    async fn add_schedule(&self, _task: ScheduledTask) -> Result<(), ScheduleError> {
        Err(ScheduleError::ReadOnly)
    }

    async fn delete_schedule(&self, _schedule_id: &str) -> Result<(), ScheduleError> {
        Err(ScheduleError::ReadOnly)
    }

    async fn get_schedule_by_id(&self, schedule_id: &str) -> Result<Option<ScheduledTask>, ScheduleError> {
        Ok(self.schedules.iter().find(|s| s.schedule_id == schedule_id).cloned())
    }

    async fn list_schedule_ids(&self) -> Result<Vec<String>, ScheduleError> {
        Ok(self.schedules.iter().map(|s| s.schedule_id.clone()).collect())
    }

    async fn clear_all_schedules(&self) -> Result<u64, ScheduleError> {
        Err(ScheduleError::ReadOnly)
    }

    async fn schedule_count(&self) -> Result<u64, ScheduleError> {
        Ok(self.schedules.len() as u64)
    }

    async fn post_send(&self, _task: &ScheduledTask) -> Result<(), ScheduleError> {
        Ok(())
    }
}
