use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task name must not be empty")]
    EmptyName,
    #[error("unknown task: {0}")]
    UnknownTask(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("task failed: {0}")]
    Handler(String),
    #[error("schedule error: {0}")]
    Schedule(#[from] crate::scheduler::ScheduleError),
}
