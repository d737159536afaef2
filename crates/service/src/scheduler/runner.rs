use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::cron::CronSchedule;
use super::errors::ScheduleError;
use super::scheduled_task::ScheduledTask;
use super::source::ScheduleSource;
use crate::tasks::TaskBroker;

/// Polls schedule sources and kicks due tasks onto the broker.
///
/// Cron schedules fire at most once per matching minute, interval schedules every
/// `interval` seconds after first being seen, and `time` schedules once when due.
pub struct TaskScheduler {
    sources: Vec<Arc<dyn ScheduleSource>>,
    broker: Arc<dyn TaskBroker>,
    tick_every: Duration,
    cron_fired: HashMap<String, DateTime<Utc>>,
    interval_due: HashMap<String, DateTime<Utc>>,
    time_fired: HashSet<String>,
}

impl TaskScheduler {
    pub fn new(sources: Vec<Arc<dyn ScheduleSource>>, broker: Arc<dyn TaskBroker>, tick_every: Duration) -> Self {
        Self {
            sources,
            broker,
            tick_every,
            cron_fired: HashMap::new(),
            interval_due: HashMap::new(),
            time_fired: HashSet::new(),
        }
    }

    /// One evaluation pass at `now`. Returns how many tasks were kicked.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<usize, ScheduleError> {
        let minute = now.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(now);
        let mut seen: HashSet<String> = HashSet::new();
        let mut kicked = 0;

        for source in self.sources.clone() {
            let schedules = match source.get_schedules().await {
                Ok(s) => s,
                Err(e) => {
                    warn!(source = source.name(), error = %e, "failed to read schedules");
                    continue;
                }
            };
            for task in schedules {
                seen.insert(task.schedule_id.clone());
                if !self.is_due(&task, now, minute) {
                    continue;
                }
                let msg = task.to_message();
                let task_id = msg.task_id.clone();
                if let Err(e) = self.broker.kick(msg).await {
                    error!(schedule_id = %task.schedule_id, task_name = %task.task_name, error = %e, "failed to send scheduled task");
                    continue;
                }
                kicked += 1;
                info!(event = "schedule_fired", source = source.name(), schedule_id = %task.schedule_id, task_name = %task.task_name, task_id = %task_id, "scheduled task sent");
                if let Err(e) = source.post_send(&task).await {
                    warn!(schedule_id = %task.schedule_id, error = %e, "post_send failed");
                }
            }
        }

        self.cron_fired.retain(|id, _| seen.contains(id));
        self.interval_due.retain(|id, _| seen.contains(id));
        self.time_fired.retain(|id| seen.contains(id));
        Ok(kicked)
    }

    fn is_due(&mut self, task: &ScheduledTask, now: DateTime<Utc>, minute: DateTime<Utc>) -> bool {
        let id = &task.schedule_id;
        let mut due = false;

        if let Some(expr) = &task.cron {
            match CronSchedule::parse(expr) {
                Ok(cron) if cron.matches(&minute) && self.cron_fired.get(id) != Some(&minute) => {
                    self.cron_fired.insert(id.clone(), minute);
                    due = true;
                }
                Ok(_) => {}
                Err(e) => warn!(schedule_id = %id, cron = %expr, error = %e, "skipping schedule with invalid cron"),
            }
        }

        if let Some(secs) = task.interval.filter(|s| *s > 0) {
            let period = chrono::Duration::seconds(secs as i64);
            match self.interval_due.get(id).copied() {
                None => {
                    self.interval_due.insert(id.clone(), now + period);
                }
                Some(next) if next <= now => {
                    self.interval_due.insert(id.clone(), now + period);
                    due = true;
                }
                Some(_) => {}
            }
        }

        if let Some(at) = task.time {
            if at <= now && !self.time_fired.contains(id) {
                self.time_fired.insert(id.clone());
                due = true;
            }
        }

        due
    }

    /// Tick until `shutdown` flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let names: Vec<&'static str> = self.sources.iter().map(|s| s.name()).collect();
        info!(sources = ?names, tick_ms = self.tick_every.as_millis() as u64, "scheduler started");
        let mut interval = tokio::time::interval(self.tick_every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!(error = %e, "scheduler tick failed");
                    }
                }
                _ = common::shutdown::wait_for_shutdown(&mut shutdown) => break,
            }
        }
        info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::MemoryScheduleSource;
    use crate::tasks::MemoryBroker;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, s).unwrap()
    }

    async fn setup(tasks: Vec<ScheduledTask>) -> (Arc<MemoryScheduleSource>, Arc<MemoryBroker>, TaskScheduler) {
        let source = Arc::new(MemoryScheduleSource::new());
        for t in tasks {
            source.add_schedule(t).await.unwrap();
        }
        let broker = Arc::new(MemoryBroker::new());
        let sched = TaskScheduler::new(vec![source.clone() as Arc<dyn ScheduleSource>], broker.clone(), Duration::from_millis(10));
        (source, broker, sched)
    }

    #[tokio::test]
    async fn cron_fires_once_per_minute() {
        let (_, broker, mut s) = setup(vec![ScheduledTask::new("mail_now").with_cron("*/2 * * * *")]).await;
        assert_eq!(s.tick(at(10, 0, 1)).await.unwrap(), 1);
        assert_eq!(s.tick(at(10, 0, 30)).await.unwrap(), 0);
        assert_eq!(s.tick(at(10, 1, 0)).await.unwrap(), 0);
        assert_eq!(s.tick(at(10, 2, 5)).await.unwrap(), 1);
        assert_eq!(broker.queued(), 2);
    }

    #[tokio::test]
    async fn one_shot_fires_when_due_and_is_removed() {
        let task = ScheduledTask::new("process_user_registration").with_schedule_id("once").with_task_id("fixed").at(at(10, 0, 30));
        let (source, broker, mut s) = setup(vec![task]).await;
        assert_eq!(s.tick(at(10, 0, 29)).await.unwrap(), 0);
        assert_eq!(s.tick(at(10, 0, 31)).await.unwrap(), 1);
        assert_eq!(source.schedule_count().await.unwrap(), 0);
        assert_eq!(broker.pop().await.unwrap().unwrap().task_id, "fixed");
        assert_eq!(s.tick(at(10, 0, 40)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn interval_waits_one_period_between_sends() {
        let (_, broker, mut s) = setup(vec![ScheduledTask::new("heartbeat").every(10)]).await;
        assert_eq!(s.tick(at(10, 0, 0)).await.unwrap(), 0);
        assert_eq!(s.tick(at(10, 0, 5)).await.unwrap(), 0);
        assert_eq!(s.tick(at(10, 0, 10)).await.unwrap(), 1);
        assert_eq!(s.tick(at(10, 0, 15)).await.unwrap(), 0);
        assert_eq!(s.tick(at(10, 0, 21)).await.unwrap(), 1);
        assert_eq!(broker.queued(), 2);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (_, _, s) = setup(vec![]).await;
        let (tx, rx) = common::shutdown::shutdown_channel();
        let handle = tokio::spawn(s.run(rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
