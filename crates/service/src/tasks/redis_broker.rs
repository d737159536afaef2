use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use super::broker::TaskBroker;
use super::errors::TaskError;
use super::message::{TaskMessage, TaskResult};

/// Redis list queue: producers `LPUSH {prefix}:queue`, workers `RPOP` it.
/// Results are stored as JSON strings under `{prefix}:result:{task_id}` with a TTL.
#[derive(Clone)]
pub struct RedisBroker {
    conn: ConnectionManager,
    prefix: String,
    result_ttl_secs: u64,
}

impl RedisBroker {
    pub async fn connect(url: &str, prefix: &str, result_ttl_secs: u64) -> Result<Self, TaskError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::with_connection(conn, prefix, result_ttl_secs))
    }

    pub fn with_connection(conn: ConnectionManager, prefix: &str, result_ttl_secs: u64) -> Self {
        Self { conn, prefix: prefix.trim_end_matches(':').to_string(), result_ttl_secs }
    }

    pub fn queue_key(&self) -> String {
        format!("{}:queue", self.prefix)
    }

    pub fn result_key(&self, task_id: &str) -> String {
        format!("{}:result:{}", self.prefix, task_id)
    }
}

#[async_trait]
impl TaskBroker for RedisBroker {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn kick(&self, msg: TaskMessage) -> Result<(), TaskError> {
        let payload = serde_json::to_string(&msg)?;
        let mut con = self.conn.clone();
        let _: i64 = con.lpush(self.queue_key(), payload).await?;
        debug!(task_id = %msg.task_id, task_name = %msg.task_name, "task kicked");
        Ok(())
    }

    async fn pop(&self) -> Result<Option<TaskMessage>, TaskError> {
        let mut con = self.conn.clone();
        let raw: Option<String> = redis::cmd("RPOP").arg(self.queue_key()).query_async(&mut con).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn set_result(&self, result: TaskResult) -> Result<(), TaskError> {
        let payload = serde_json::to_string(&result)?;
        let mut con = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(self.result_key(&result.task_id))
            .arg(payload)
            .arg("EX")
            .arg(self.result_ttl_secs)
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn get_result(&self, task_id: &str) -> Result<Option<TaskResult>, TaskError> {
        let mut con = self.conn.clone();
        let raw: Option<String> = con.get(self.result_key(task_id)).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::redis_url;

    #[tokio::test]
    async fn queue_and_results_round_trip() {
        let Some(url) = redis_url() else { return };
        let prefix = format!("taskq-test-{}", uuid::Uuid::new_v4().simple());
        let broker = match RedisBroker::connect(&url, &prefix, 60).await {
            Ok(b) => b,
            Err(e) => {
                eprintln!("skip: cannot connect to redis: {e}");
                return;
            }
        };
        assert_eq!(broker.queue_key(), format!("{prefix}:queue"));

        broker.kick(TaskMessage::new("first").with_task_id("1")).await.unwrap();
        broker.kick(TaskMessage::new("second").with_task_id("2")).await.unwrap();
        assert_eq!(broker.pop().await.unwrap().unwrap().task_id, "1");
        assert_eq!(broker.pop().await.unwrap().unwrap().task_id, "2");
        assert!(broker.pop().await.unwrap().is_none());

        let result = TaskResult {
            task_id: "1".into(),
            task_name: "first".into(),
            is_err: false,
            return_value: Some(serde_json::json!(1)),
            error: None,
            execution_time_ms: 3,
            finished_at: chrono::Utc::now(),
        };
        broker.set_result(result.clone()).await.unwrap();
        assert_eq!(broker.get_result("1").await.unwrap(), Some(result));

        let mut con = broker.conn.clone();
        let _: () = con.del(broker.result_key("1")).await.unwrap();
    }
}
