use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};

use super::errors::ScheduleError;
use super::scheduled_task::ScheduledTask;
use super::source::ScheduleSource;

/// Schedules shared across processes through Redis.
///
/// Each schedule is a hash at `{prefix}:{schedule_id}`; the set `{prefix}:list` holds the ids.
#[derive(Clone)]
pub struct RedisScheduleSource {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisScheduleSource {
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, ScheduleError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::with_connection(conn, prefix))
    }

    pub fn with_connection(conn: ConnectionManager, prefix: &str) -> Self {
        Self { conn, prefix: prefix.trim_end_matches(':').to_string() }
    }

    pub fn schedule_key(&self, schedule_id: &str) -> String {
        format!("{}:{}", self.prefix, schedule_id)
    }

    pub fn list_key(&self) -> String {
        format!("{}:list", self.prefix)
    }

    async fn load(&self, con: &mut ConnectionManager, schedule_id: &str) -> Result<Option<ScheduledTask>, ScheduleError> {
        let data: HashMap<String, String> = con.hgetall(self.schedule_key(schedule_id)).await?;
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(ScheduledTask::from_flat_map(&data)?))
    }
}

#[async_trait]
impl ScheduleSource for RedisScheduleSource {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get_schedules(&self) -> Result<Vec<ScheduledTask>, ScheduleError> {
        let mut con = self.conn.clone();
        let mut ids: Vec<String> = con.smembers(self.list_key()).await?;
        ids.sort();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load(&mut con, &id).await {
                Ok(Some(task)) => out.push(task),
                Ok(None) => debug!(schedule_id = %id, "listed schedule has no data"),
                Err(ScheduleError::Redis(e)) => return Err(ScheduleError::Redis(e)),
                Err(e) => warn!(schedule_id = %id, error = %e, "skipping unreadable schedule"),
            }
        }
        Ok(out)
    }

    async fn add_schedule(&self, task: ScheduledTask) -> Result<(), ScheduleError> {
        task.validate()?;
        let fields: Vec<(String, String)> = task.to_flat_map()?.into_iter().collect();
        let mut con = self.conn.clone();
        let _: () = con.hset_multiple(self.schedule_key(&task.schedule_id), &fields).await?;
        let _: i64 = con.sadd(self.list_key(), &task.schedule_id).await?;
        debug!(schedule_id = %task.schedule_id, task_name = %task.task_name, "schedule stored");
        Ok(())
    }

    async fn delete_schedule(&self, schedule_id: &str) -> Result<(), ScheduleError> {
        let mut con = self.conn.clone();
        let exists: bool = con.exists(self.schedule_key(schedule_id)).await?;
        if !exists {
            return Err(ScheduleError::NotFound(schedule_id.to_string()));
        }
        let _: i64 = con.del(self.schedule_key(schedule_id)).await?;
        let _: i64 = con.srem(self.list_key(), schedule_id).await?;
        Ok(())
    }

    async fn get_schedule_by_id(&self, schedule_id: &str) -> Result<Option<ScheduledTask>, ScheduleError> {
        let mut con = self.conn.clone();
        self.load(&mut con, schedule_id).await
    }

    async fn list_schedule_ids(&self) -> Result<Vec<String>, ScheduleError> {
        let mut con = self.conn.clone();
        let mut ids: Vec<String> = con.smembers(self.list_key()).await?;
        ids.sort();
        Ok(ids)
    }

    async fn clear_all_schedules(&self) -> Result<u64, ScheduleError> {
        let mut con = self.conn.clone();
        let ids: Vec<String> = con.smembers(self.list_key()).await?;
        let count = ids.len() as u64;
        if count > 0 {
            let mut keys: Vec<String> = ids.iter().map(|id| self.schedule_key(id)).collect();
            keys.push(self.list_key());
            let _: i64 = con.del(keys).await?;
        }
        Ok(count)
    }

    async fn schedule_count(&self) -> Result<u64, ScheduleError> {
        let mut con = self.conn.clone();
        let n: u64 = con.scard(self.list_key()).await?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::redis_url;

    async fn source() -> Option<RedisScheduleSource> {
        let url = redis_url()?;
        let prefix = format!("taskq-test:schedules:{}", uuid::Uuid::new_v4().simple());
        match RedisScheduleSource::connect(&url, &prefix).await {
            Ok(s) => Some(s),
            Err(e) => {
                eprintln!("skip: cannot connect to redis: {e}");
                None
            }
        }
    }

    #[tokio::test]
    async fn crud_against_redis() {
        let Some(src) = source().await else { return };
        let task = ScheduledTask::new("mail_now").with_schedule_id("s1").with_cron("*/1 * * * *").with_label("task-type", "schedule");
        src.add_schedule(task.clone()).await.unwrap();
        src.add_schedule(ScheduledTask::new("heartbeat").with_schedule_id("s2").every(60)).await.unwrap();

        assert_eq!(src.schedule_count().await.unwrap(), 2);
        assert_eq!(src.list_schedule_ids().await.unwrap(), vec!["s1", "s2"]);
        assert_eq!(src.get_schedule_by_id("s1").await.unwrap(), Some(task));
        assert!(src.get_schedule_by_id("missing").await.unwrap().is_none());

        src.delete_schedule("s1").await.unwrap();
        assert!(matches!(src.delete_schedule("s1").await, Err(ScheduleError::NotFound(_))));
        assert_eq!(src.clear_all_schedules().await.unwrap(), 1);
        assert_eq!(src.schedule_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupt_records_are_skipped() {
        let Some(src) = source().await else { return };
        let mut con = src.conn.clone();
        let _: () = con
            .hset_multiple(src.schedule_key("bad"), &[("task_name", "x"), ("schedule_id", "bad"), ("kwargs", "{oops")])
            .await
            .unwrap();
        let _: i64 = con.sadd(src.list_key(), "bad").await.unwrap();
        src.add_schedule(ScheduledTask::new("mail_now").with_schedule_id("good").every(5)).await.unwrap();

        let all = src.get_schedules().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].schedule_id, "good");
        src.clear_all_schedules().await.unwrap();
    }
}
