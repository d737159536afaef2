//! Outgoing mail: a `Mailer` seam, a logging transport and a queue-backed transport.

mod template;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::tasks::{TaskBroker, TaskMessage};

pub use template::{render_template, template_by_name, WELCOME_EMAIL};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("no recipients")]
    NoRecipients,
    #[error("enqueue failed: {0}")]
    Enqueue(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub from: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

impl OutgoingMail {
    /// Render a named template with `context` into an HTML mail.
    pub fn from_template(
        to: Vec<String>,
        subject: impl Into<String>,
        template_name: &str,
        context: &BTreeMap<String, String>,
    ) -> Result<Self, MailError> {
        if to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        let source = template_by_name(template_name).ok_or_else(|| MailError::UnknownTemplate(template_name.into()))?;
        Ok(Self { from: None, to, subject: subject.into(), html_body: render_template(source, context) })
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Writes mails to the log instead of delivering them.
#[derive(Debug, Clone)]
pub struct LogMailer {
    pub from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if mail.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        let from = mail.from.as_deref().unwrap_or(&self.from);
        info!(event = "mail_sent", from = %from, to = ?mail.to, subject = %mail.subject, bytes = mail.html_body.len(), "mail delivered to log");
        debug!(body = %mail.html_body, "mail body");
        Ok(())
    }
}

/// Hands mail to the task queue as a `send_email` task.
#[derive(Clone)]
pub struct QueueMailer {
    broker: Arc<dyn TaskBroker>,
}

impl QueueMailer {
    pub const TASK_NAME: &'static str = "send_email";

    pub fn new(broker: Arc<dyn TaskBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl Mailer for QueueMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if mail.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        let payload = serde_json::to_value(&mail).map_err(|e| MailError::Enqueue(e.to_string()))?;
        let mut kwargs = serde_json::Map::new();
        kwargs.insert("mail".into(), payload);
        let msg = TaskMessage::new(Self::TASK_NAME).with_kwargs(kwargs);
        let task_id = msg.task_id.clone();
        self.broker.kick(msg).await.map_err(|e| MailError::Enqueue(e.to_string()))?;
        debug!(task_id = %task_id, subject = %mail.subject, "mail queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::MemoryBroker;

    fn welcome_ctx() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("name".to_string(), "Ann".to_string()),
            ("activation_link".to_string(), "http://localhost:8080/api/v1/users/activate".to_string()),
        ])
    }

    #[test]
    fn welcome_template_renders_context() {
        let mail = OutgoingMail::from_template(vec!["ann@example.com".into()], "Welcome, Ann!", "welcome_email.html", &welcome_ctx()).unwrap();
        assert!(mail.html_body.contains("Welcome, Ann!"));
        assert!(mail.html_body.contains("http://localhost:8080/api/v1/users/activate"));
        assert!(!mail.html_body.contains("{{"));
    }

    #[test]
    fn template_errors() {
        let ctx = welcome_ctx();
        assert!(matches!(OutgoingMail::from_template(vec!["a@b.co".into()], "s", "missing.html", &ctx), Err(MailError::UnknownTemplate(_))));
        assert!(matches!(OutgoingMail::from_template(vec![], "s", "welcome_email.html", &ctx), Err(MailError::NoRecipients)));
    }

    #[tokio::test]
    async fn log_mailer_accepts_mail() {
        let mail = OutgoingMail { from: None, to: vec!["a@b.co".into()], subject: "hi".into(), html_body: "<p>hi</p>".into() };
        LogMailer::new("no-reply@example.com").send(mail).await.unwrap();
    }

    #[tokio::test]
    async fn queue_mailer_enqueues_send_email_task() {
        let broker = Arc::new(MemoryBroker::new());
        let mailer = QueueMailer::new(broker.clone());
        let mail = OutgoingMail { from: None, to: vec!["a@b.co".into()], subject: "hi".into(), html_body: "<p>hi</p>".into() };
        mailer.send(mail.clone()).await.unwrap();

        let msg = broker.pop().await.unwrap().expect("queued message");
        assert_eq!(msg.task_name, "send_email");
        let decoded: OutgoingMail = serde_json::from_value(msg.kwargs["mail"].clone()).unwrap();
        assert_eq!(decoded, mail);
    }
}
