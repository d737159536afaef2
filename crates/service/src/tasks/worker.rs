use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::broker::TaskBroker;
use super::errors::TaskError;
use super::message::{TaskMessage, TaskResult};
use super::registry::TaskRegistry;

/// Pops messages, runs the registered handler and stores a `TaskResult`.
pub struct Worker {
    broker: Arc<dyn TaskBroker>,
    registry: Arc<TaskRegistry>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(broker: Arc<dyn TaskBroker>, registry: Arc<TaskRegistry>, poll_interval: Duration) -> Self {
        Self { broker, registry, poll_interval }
    }

    /// Handle at most one message. `Ok(None)` when the queue was empty.
    pub async fn process_one(&self) -> Result<Option<TaskResult>, TaskError> {
        let Some(msg) = self.broker.pop().await? else { return Ok(None) };
        let result = self.execute(&msg).await;
        self.broker.set_result(result.clone()).await?;
        Ok(Some(result))
    }

    async fn execute(&self, msg: &TaskMessage) -> TaskResult {
        let started = Instant::now();
        let outcome = match self.registry.get(&msg.task_name) {
            Some(handler) => handler.run(msg).await,
            None => Err(TaskError::UnknownTask(msg.task_name.clone())),
        };
        let execution_time_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(value) => {
                info!(event = "task_done", task_id = %msg.task_id, task_name = %msg.task_name, execution_time_ms, "task finished");
                TaskResult {
                    task_id: msg.task_id.clone(),
                    task_name: msg.task_name.clone(),
                    is_err: false,
                    return_value: Some(value),
                    error: None,
                    execution_time_ms,
                    finished_at: Utc::now(),
                }
            }
            Err(e) => {
                warn!(event = "task_failed", task_id = %msg.task_id, task_name = %msg.task_name, error = %e, "task failed");
                TaskResult {
                    task_id: msg.task_id.clone(),
                    task_name: msg.task_name.clone(),
                    is_err: true,
                    return_value: None,
                    error: Some(e.to_string()),
                    execution_time_ms,
                    finished_at: Utc::now(),
                }
            }
        }
    }

    /// Drain the queue until `shutdown` flips; sleeps `poll_interval` when idle.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(broker = self.broker.name(), tasks = ?self.registry.names(), "worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let idle = match self.process_one().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    error!(error = %e, "worker broker error");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = common::shutdown::wait_for_shutdown(&mut shutdown) => break,
                }
            }
        }
        info!("worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::LogMailer;
    use crate::tasks::{MemoryBroker, MAIL_NOW};

    fn setup() -> (Arc<MemoryBroker>, Worker) {
        let broker = Arc::new(MemoryBroker::new());
        let registry = Arc::new(TaskRegistry::with_builtins(Arc::new(LogMailer::new("x@y.io"))));
        let worker = Worker::new(broker.clone(), registry, Duration::from_millis(10));
        (broker, worker)
    }

    #[tokio::test]
    async fn runs_known_task_and_stores_result() {
        let (broker, worker) = setup();
        broker.kick(TaskMessage::new(MAIL_NOW).with_task_id("t1")).await.unwrap();

        let result = worker.process_one().await.unwrap().unwrap();
        assert!(!result.is_err);
        assert_eq!(result.return_value, Some(serde_json::json!("Sending mail now")));
        assert_eq!(broker.get_result("t1").await.unwrap(), Some(result));
        assert!(worker.process_one().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_task_yields_error_result() {
        let (broker, worker) = setup();
        broker.kick(TaskMessage::new("nope").with_task_id("t2")).await.unwrap();
        let result = worker.process_one().await.unwrap().unwrap();
        assert!(result.is_err);
        assert_eq!(result.error.as_deref(), Some("unknown task: nope"));
    }

    #[tokio::test]
    async fn run_loop_exits_on_shutdown() {
        let (broker, worker) = setup();
        broker.kick(TaskMessage::new(MAIL_NOW).with_task_id("t3")).await.unwrap();
        let (tx, rx) = common::shutdown::shutdown_channel();
        let handle = tokio::spawn(worker.run(rx));

        for _ in 0..100 {
            if broker.get_result("t3").await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(broker.get_result("t3").await.unwrap().is_some());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
