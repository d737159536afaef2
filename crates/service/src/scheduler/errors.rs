use thiserror::Error;

use super::cron::CronError;

/// Errors that can occur within the scheduling subsystem.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid schedule: {0}")]
    Invalid(String),

    #[error("invalid cron expression: {0}")]
    Cron(#[from] CronError),

    #[error("Schedule with ID '{0}' not found")]
    NotFound(String),

    #[error("task '{0}' is not registered")]
    UnknownTask(String),

    #[error("schedule source is read-only")]
    ReadOnly,

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Backend(String),
}
