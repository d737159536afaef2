use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::builtin;
use super::errors::TaskError;
use super::message::TaskMessage;
use crate::mail::Mailer;

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, msg: &TaskMessage) -> Result<Value, TaskError>;
}

/// A cron schedule declared next to the task itself.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSchedule {
    pub cron: String,
    pub labels: Map<String, Value>,
}

struct Entry {
    handler: Arc<dyn TaskHandler>,
    schedules: Vec<LabelSchedule>,
}

/// Task name → handler. Built once at startup and shared read-only.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Entry>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in task; `send_email` delivers through `mailer`.
    pub fn with_builtins(mailer: Arc<dyn Mailer>) -> Self {
        let mut reg = Self::new();
        builtin::register_all(&mut reg, mailer);
        reg
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn TaskHandler>) -> &mut Self {
        self.tasks.insert(name.into(), Entry { handler, schedules: Vec::new() });
        self
    }

    pub fn register_scheduled(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
        schedule: LabelSchedule,
    ) -> &mut Self {
        self.tasks.insert(name.into(), Entry { handler, schedules: vec![schedule] });
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.tasks.get(name).map(|e| e.handler.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every `(task_name, schedule)` pair declared at registration, sorted by name.
    pub fn label_schedules(&self) -> Vec<(String, LabelSchedule)> {
        let mut out: Vec<(String, LabelSchedule)> = self
            .tasks
            .iter()
            .flat_map(|(name, e)| e.schedules.iter().map(move |s| (name.clone(), s.clone())))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
