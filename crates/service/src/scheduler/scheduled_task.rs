use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::cron::CronSchedule;
use super::errors::ScheduleError;
use crate::tasks::TaskMessage;

fn new_schedule_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A schedule record: which task to send, with what payload, and when.
///
/// At least one trigger is set: `cron` (recurring), `time` (one-shot) or
/// `interval` (every N seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub task_name: String,
    #[serde(default = "new_schedule_id")]
    pub schedule_id: String,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub labels: Map<String, Value>,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interval: Option<u64>,
}

impl ScheduledTask {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            schedule_id: new_schedule_id(),
            cron: None,
            labels: Map::new(),
            args: Vec::new(),
            kwargs: Map::new(),
            task_id: None,
            time: None,
            interval: None,
        }
    }

    pub fn with_cron(mut self, cron: impl Into<String>) -> Self {
        self.cron = Some(cron.into());
        self
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn every(mut self, seconds: u64) -> Self {
        self.interval = Some(seconds);
        self
    }

    pub fn with_schedule_id(mut self, id: impl Into<String>) -> Self {
        self.schedule_id = id.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Fires once at `time` and nothing else.
    pub fn is_one_shot(&self) -> bool {
        self.time.is_some() && self.cron.is_none() && self.interval.is_none()
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.task_name.trim().is_empty() {
            return Err(ScheduleError::Invalid("task_name must not be empty".into()));
        }
        if self.schedule_id.trim().is_empty() {
            return Err(ScheduleError::Invalid("schedule_id must not be empty".into()));
        }
        // ids become `<prefix>:<id>` keys next to the `<prefix>:list` index
        if self.schedule_id == "list" || self.schedule_id.contains(':') {
            return Err(ScheduleError::Invalid("schedule_id must not be 'list' or contain ':'".into()));
        }
        if self.cron.is_none() && self.time.is_none() && self.interval.is_none() {
            return Err(ScheduleError::Invalid("one of cron, time or interval is required".into()));
        }
        if let Some(expr) = &self.cron {
            CronSchedule::parse(expr)?;
        }
        if self.interval == Some(0) {
            return Err(ScheduleError::Invalid("interval must be positive".into()));
        }
        Ok(())
    }

    /// Message to kick when this schedule fires.
    pub fn to_message(&self) -> TaskMessage {
        let msg = TaskMessage::new(self.task_name.clone())
            .with_labels(self.labels.clone())
            .with_args(self.args.clone())
            .with_kwargs(self.kwargs.clone());
        match &self.task_id {
            Some(id) => msg.with_task_id(id.clone()),
            None => msg,
        }
    }

    /// String-only encoding used as a Redis hash.
    pub fn to_flat_map(&self) -> Result<BTreeMap<String, String>, ScheduleError> {
        let mut m = BTreeMap::new();
        m.insert("task_name".into(), self.task_name.clone());
        m.insert("schedule_id".into(), self.schedule_id.clone());
        m.insert("cron".into(), self.cron.clone().unwrap_or_default());
        m.insert("labels".into(), serde_json::to_string(&self.labels)?);
        m.insert("args".into(), serde_json::to_string(&self.args)?);
        m.insert("kwargs".into(), serde_json::to_string(&self.kwargs)?);
        m.insert("task_id".into(), self.task_id.clone().unwrap_or_default());
        m.insert("time".into(), self.time.map(|t| t.to_rfc3339()).unwrap_or_default());
        m.insert("interval".into(), self.interval.map(|i| i.to_string()).unwrap_or_default());
        Ok(m)
    }

    /// Inverse of [`ScheduledTask::to_flat_map`]. Missing optional keys decode as empty.
    pub fn from_flat_map(map: &HashMap<String, String>) -> Result<Self, ScheduleError> {
        let required = |key: &str| {
            map.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| ScheduleError::Invalid(format!("missing {key}")))
        };
        let optional = |key: &str| map.get(key).filter(|v| !v.is_empty()).cloned();
        let json_or_default = |key: &str, default: &str| -> Result<Value, ScheduleError> {
            Ok(serde_json::from_str(optional(key).as_deref().unwrap_or(default))?)
        };

        let labels = match json_or_default("labels", "{}")? {
            Value::Object(m) => m,
            _ => return Err(ScheduleError::Invalid("labels must be a JSON object".into())),
        };
        let args = match json_or_default("args", "[]")? {
            Value::Array(a) => a,
            _ => return Err(ScheduleError::Invalid("args must be a JSON array".into())),
        };
        let kwargs = match json_or_default("kwargs", "{}")? {
            Value::Object(m) => m,
            _ => return Err(ScheduleError::Invalid("kwargs must be a JSON object".into())),
        };
        let time = optional("time")
            .map(|t| DateTime::parse_from_rfc3339(&t).map(|d| d.with_timezone(&Utc)))
            .transpose()
            .map_err(|e| ScheduleError::Invalid(format!("time: {e}")))?;
        let interval = optional("interval")
            .map(|i| i.parse::<u64>())
            .transpose()
            .map_err(|e| ScheduleError::Invalid(format!("interval: {e}")))?;

        Ok(Self {
            task_name: required("task_name")?,
            schedule_id: required("schedule_id")?,
            cron: optional("cron"),
            labels,
            args,
            kwargs,
            task_id: optional("task_id"),
            time,
            interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn flat(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn flat_map_keeps_every_field() {
        let t = ScheduledTask::new("mail_now")
            .with_cron("*/1 * * * *")
            .with_label("task-type", "schedule")
            .with_args(vec![json!(1), json!("two")])
            .with_task_id("fixed")
            .at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
            .every(30);
        let m = t.to_flat_map().unwrap();
        assert_eq!(m["cron"], "*/1 * * * *");
        assert_eq!(m["labels"], r#"{"task-type":"schedule"}"#);
        assert_eq!(m["interval"], "30");

        let back = ScheduledTask::from_flat_map(&m.into_iter().collect()).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn empty_optionals_encode_as_empty_strings() {
        let m = ScheduledTask::new("heartbeat").with_cron("0 * * * *").to_flat_map().unwrap();
        assert_eq!(m["task_id"], "");
        assert_eq!(m["time"], "");
        assert_eq!(m["args"], "[]");
    }

    #[test]
    fn decode_tolerates_missing_optional_keys() {
        let t = ScheduledTask::from_flat_map(&flat(&[("task_name", "x"), ("schedule_id", "abc")])).unwrap();
        assert_eq!(t.cron, None);
        assert!(t.labels.is_empty() && t.args.is_empty() && t.kwargs.is_empty());
    }

    #[test]
    fn decode_rejects_broken_records() {
        assert!(ScheduledTask::from_flat_map(&flat(&[("schedule_id", "abc")])).is_err());
        assert!(ScheduledTask::from_flat_map(&flat(&[("task_name", "x"), ("schedule_id", "a"), ("kwargs", "{nope")])).is_err());
        assert!(ScheduledTask::from_flat_map(&flat(&[("task_name", "x"), ("schedule_id", "a"), ("args", "{}")])).is_err());
        assert!(ScheduledTask::from_flat_map(&flat(&[("task_name", "x"), ("schedule_id", "a"), ("time", "yesterday")])).is_err());
    }

    #[test]
    fn validation_rules() {
        assert!(ScheduledTask::new("x").validate().is_err());
        assert!(ScheduledTask::new("").with_cron("* * * * *").validate().is_err());
        assert!(ScheduledTask::new("x").with_cron("bad").validate().is_err());
        assert!(ScheduledTask::new("x").every(0).validate().is_err());
        assert!(ScheduledTask::new("x").with_schedule_id(" ").every(5).validate().is_err());
        assert!(ScheduledTask::new("x").every(5).validate().is_ok());
        assert!(ScheduledTask::new("x").at(Utc::now()).is_one_shot());
    }

    #[test]
    fn schedule_id_cannot_collide_with_store_keys() {
        assert!(ScheduledTask::new("x").with_schedule_id("list").every(5).validate().is_err());
        assert!(ScheduledTask::new("x").with_schedule_id("a:b").every(5).validate().is_err());
        assert!(ScheduledTask::new("x").with_schedule_id("listing").every(5).validate().is_ok());
    }

    #[test]
    fn json_body_defaults_schedule_id() {
        let t: ScheduledTask = serde_json::from_value(json!({"task_name": "mail_now", "cron": "*/5 * * * *"})).unwrap();
        assert_eq!(t.schedule_id.len(), 32);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn message_carries_payload_and_fixed_task_id() {
        let mut kwargs = Map::new();
        kwargs.insert("data".into(), json!({"name": "Ann"}));
        let msg = ScheduledTask::new("process_user_registration").with_kwargs(kwargs).with_task_id("t-1").to_message();
        assert_eq!(msg.task_id, "t-1");
        assert_eq!(msg.kwargs["data"]["name"], "Ann");
    }
}
