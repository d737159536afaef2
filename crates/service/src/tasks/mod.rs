//! Background task queue: messages, brokers, a name → handler registry, the worker loop
//! and the invoker used by HTTP handlers.

mod broker;
mod builtin;
mod errors;
mod invoker;
mod message;
mod redis_broker;
mod registry;
mod worker;

pub use broker::{MemoryBroker, TaskBroker};
pub use builtin::{HEARTBEAT, MAIL_NOW, PROCESS_USER_REGISTRATION, SEND_EMAIL};
pub use errors::TaskError;
pub use invoker::{InvokeOutcome, TaskInvoker};
pub use message::{TaskMessage, TaskResult};
pub use redis_broker::RedisBroker;
pub use registry::{LabelSchedule, TaskHandler, TaskRegistry};
pub use worker::Worker;
