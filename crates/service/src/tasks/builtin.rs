use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::info;

use super::errors::TaskError;
use super::message::TaskMessage;
use super::registry::{LabelSchedule, TaskHandler, TaskRegistry};
use crate::mail::{Mailer, OutgoingMail};

pub const PROCESS_USER_REGISTRATION: &str = "process_user_registration";
pub const MAIL_NOW: &str = "mail_now";
pub const HEARTBEAT: &str = "heartbeat";
pub const SEND_EMAIL: &str = "send_email";

pub(super) fn register_all(reg: &mut TaskRegistry, mailer: Arc<dyn Mailer>) {
    let mut labels = Map::new();
    labels.insert("task-type".into(), Value::from("heartbeat"));

    reg.register(PROCESS_USER_REGISTRATION, Arc::new(ProcessUserRegistration))
        .register(MAIL_NOW, Arc::new(MailNow))
        .register(SEND_EMAIL, Arc::new(SendEmail { mailer }))
        .register_scheduled(HEARTBEAT, Arc::new(Heartbeat), LabelSchedule { cron: "*/1 * * * *".into(), labels });
}

/// Follow-up work after a sign-up; payload arrives as `kwargs.data`.
struct ProcessUserRegistration;

#[async_trait]
impl TaskHandler for ProcessUserRegistration {
    async fn run(&self, msg: &TaskMessage) -> Result<Value, TaskError> {
        let data = msg.kwargs.get("data").cloned().unwrap_or(Value::Null);
        let who = data
            .get("name")
            .or_else(|| data.get("email"))
            .and_then(Value::as_str)
            .unwrap_or("anonymous")
            .to_string();
        info!(event = "task_execution", task = PROCESS_USER_REGISTRATION, task_id = %msg.task_id, who = %who, "processing user registration");
        Ok(Value::from(format!("User registration processed for {who}")))
    }
}

struct MailNow;

#[async_trait]
impl TaskHandler for MailNow {
    async fn run(&self, msg: &TaskMessage) -> Result<Value, TaskError> {
        info!(event = "task_execution", task = MAIL_NOW, task_id = %msg.task_id, "sending mail now");
        Ok(Value::from("Sending mail now"))
    }
}

struct Heartbeat;

#[async_trait]
impl TaskHandler for Heartbeat {
    async fn run(&self, msg: &TaskMessage) -> Result<Value, TaskError> {
        let at = Utc::now().to_rfc3339();
        info!(event = "task_execution", task = HEARTBEAT, task_id = %msg.task_id, at = %at, "heartbeat");
        Ok(Value::from(format!("heartbeat ok at {at}")))
    }
}

/// Delivers `kwargs.mail` (an `OutgoingMail`) through the configured mailer.
struct SendEmail {
    mailer: Arc<dyn Mailer>,
}

#[async_trait]
impl TaskHandler for SendEmail {
    async fn run(&self, msg: &TaskMessage) -> Result<Value, TaskError> {
        let raw = msg
            .kwargs
            .get("mail")
            .cloned()
            .ok_or_else(|| TaskError::Handler("missing `mail` kwarg".into()))?;
        let mail: OutgoingMail = serde_json::from_value(raw)?;
        let recipients = mail.to.len();
        self.mailer.send(mail).await.map_err(|e| TaskError::Handler(e.to_string()))?;
        Ok(Value::from(format!("mail sent to {recipients} recipient(s)")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::LogMailer;
    use serde_json::json;

    fn registry() -> TaskRegistry {
        TaskRegistry::with_builtins(Arc::new(LogMailer::new("no-reply@example.com")))
    }

    fn with_kwargs(name: &str, kwargs: Value) -> TaskMessage {
        let Value::Object(map) = kwargs else { panic!("kwargs must be an object") };
        TaskMessage::new(name).with_kwargs(map)
    }

    #[tokio::test]
    async fn registration_task_names_the_user() {
        let reg = registry();
        let msg = with_kwargs(PROCESS_USER_REGISTRATION, json!({"data": {"name": "Ann", "email": "ann@example.com"}}));
        let out = reg.get(PROCESS_USER_REGISTRATION).unwrap().run(&msg).await.unwrap();
        assert_eq!(out, json!("User registration processed for Ann"));

        let bare = TaskMessage::new(PROCESS_USER_REGISTRATION);
        let out = reg.get(PROCESS_USER_REGISTRATION).unwrap().run(&bare).await.unwrap();
        assert_eq!(out, json!("User registration processed for anonymous"));
    }

    #[tokio::test]
    async fn send_email_requires_mail_kwarg() {
        let reg = registry();
        let handler = reg.get(SEND_EMAIL).unwrap();
        assert!(handler.run(&TaskMessage::new(SEND_EMAIL)).await.is_err());

        let msg = with_kwargs(SEND_EMAIL, json!({"mail": {"from": null, "to": ["a@b.co"], "subject": "s", "html_body": "b"}}));
        assert_eq!(handler.run(&msg).await.unwrap(), json!("mail sent to 1 recipient(s)"));
    }

    #[tokio::test]
    async fn mail_now_and_heartbeat_return_messages() {
        let reg = registry();
        let out = reg.get(MAIL_NOW).unwrap().run(&TaskMessage::new(MAIL_NOW)).await.unwrap();
        assert_eq!(out, json!("Sending mail now"));
        let out = reg.get(HEARTBEAT).unwrap().run(&TaskMessage::new(HEARTBEAT)).await.unwrap();
        assert!(out.as_str().unwrap().starts_with("heartbeat ok at "));
    }
}
