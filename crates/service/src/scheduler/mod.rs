//! Dynamic task scheduling: `ScheduledTask` records, cron evaluation, pluggable schedule
//! sources (Redis, memory, registry labels), the envelope-returning `SchedulerService`
//! and the `TaskScheduler` tick loop that kicks due tasks onto the broker.

pub mod cron;
mod errors;
mod redis_source;
mod runner;
mod scheduled_task;
mod service;
mod source;

pub use cron::{CronError, CronSchedule};
pub use errors::ScheduleError;
pub use redis_source::RedisScheduleSource;
pub use runner::TaskScheduler;
pub use scheduled_task::ScheduledTask;
pub use service::{
    AddScheduleResponse, ClearSchedulesResponse, GetScheduleResponse, ListSchedulesResponse, RemoveScheduleResponse,
    SchedulerService, TaskInfo,
};
pub use source::{LabelScheduleSource, MemoryScheduleSource, ScheduleSource};
