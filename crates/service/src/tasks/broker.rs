use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::errors::TaskError;
use super::message::{TaskMessage, TaskResult};

/// Transport between producers (`kick`) and workers (`pop`), plus a result backend.
#[async_trait]
pub trait TaskBroker: Send + Sync {
    fn name(&self) -> &'static str;
    async fn kick(&self, msg: TaskMessage) -> Result<(), TaskError>;
    /// Non-blocking; `None` when the queue is empty.
    async fn pop(&self) -> Result<Option<TaskMessage>, TaskError>;
    async fn set_result(&self, result: TaskResult) -> Result<(), TaskError>;
    async fn get_result(&self, task_id: &str) -> Result<Option<TaskResult>, TaskError>;
}

pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_RESULT_CAPACITY: usize = 10_000;

/// In-process FIFO queue.
///
/// Results expire after `result_ttl`, like the Redis result keys, and at most
/// `result_capacity` are kept; the oldest is evicted first.
pub struct MemoryBroker {
    queue: Mutex<VecDeque<TaskMessage>>,
    results: Mutex<HashMap<String, (Instant, TaskResult)>>,
    result_ttl: Duration,
    result_capacity: usize,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self {
            queue: Mutex::default(),
            results: Mutex::default(),
            result_ttl: DEFAULT_RESULT_TTL,
            result_capacity: DEFAULT_RESULT_CAPACITY,
        }
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    pub fn with_result_capacity(mut self, capacity: usize) -> Self {
        self.result_capacity = capacity.max(1);
        self
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn stored_results(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> TaskError {
    TaskError::Handler("memory broker lock poisoned".into())
}

#[async_trait]
impl TaskBroker for MemoryBroker {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn kick(&self, msg: TaskMessage) -> Result<(), TaskError> {
        self.queue.lock().map_err(poisoned)?.push_back(msg);
        Ok(())
    }

    async fn pop(&self) -> Result<Option<TaskMessage>, TaskError> {
        Ok(self.queue.lock().map_err(poisoned)?.pop_front())
    }

    async fn set_result(&self, result: TaskResult) -> Result<(), TaskError> {
        let mut results = self.results.lock().map_err(poisoned)?;
        let now = Instant::now();
        results.retain(|_, (stored, _)| now.duration_since(*stored) < self.result_ttl);
        while results.len() >= self.result_capacity && !results.contains_key(&result.task_id) {
            let Some(oldest) = results.iter().min_by_key(|(_, (stored, _))| *stored).map(|(id, _)| id.clone()) else {
                break;
            };
            results.remove(&oldest);
        }
        results.insert(result.task_id.clone(), (now, result));
        Ok(())
    }

    async fn get_result(&self, task_id: &str) -> Result<Option<TaskResult>, TaskError> {
        let results = self.results.lock().map_err(poisoned)?;
        Ok(results
            .get(task_id)
            .filter(|(stored, _)| stored.elapsed() < self.result_ttl)
            .map(|(_, r)| r.clone()))
    }
}
