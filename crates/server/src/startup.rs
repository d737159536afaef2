use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use common::shutdown::{shutdown_channel, shutdown_signal};
use configs::{AppConfig, BrokerKind, MailConfig, TaskQueueConfig};
use service::auth::JwtKeys;
use service::mail::{LogMailer, Mailer, QueueMailer};
use service::scheduler::{
    LabelScheduleSource, MemoryScheduleSource, RedisScheduleSource, ScheduleSource, SchedulerService, TaskScheduler,
};
use service::tasks::{MemoryBroker, RedisBroker, TaskBroker, TaskInvoker, TaskRegistry, Worker};
use service::users::{SeaOrmUserRepository, UserRepository, UserService};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::routes;
use crate::state::{AuthSettings, ServerState};

/// Broker, task registry and the dynamic schedule source, wired from `taskq` config.
#[derive(Clone)]
pub struct TaskInfra {
    pub broker: Arc<dyn TaskBroker>,
    pub registry: Arc<TaskRegistry>,
    pub schedules: Arc<dyn ScheduleSource>,
}

fn transport_mailer(cfg: &MailConfig) -> Arc<dyn Mailer> {
    Arc::new(LogMailer::new(format!("{} <{}>", cfg.from_name, cfg.from_address)))
}

impl TaskInfra {
    /// Process-local broker and schedule source.
    pub fn in_memory(mail: &MailConfig) -> Self {
        Self {
            broker: Arc::new(MemoryBroker::new()),
            registry: Arc::new(TaskRegistry::with_builtins(transport_mailer(mail))),
            schedules: Arc::new(MemoryScheduleSource::new()),
        }
    }

    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let taskq = &cfg.taskq;
        match taskq.broker {
            BrokerKind::Memory => {
                let broker = MemoryBroker::new().with_result_ttl(Duration::from_secs(taskq.result_ttl_secs));
                Ok(Self { broker: Arc::new(broker), ..Self::in_memory(&cfg.mail) })
            }
            BrokerKind::Redis => {
                let broker = RedisBroker::connect(&taskq.redis_url, &taskq.key_prefix, taskq.result_ttl_secs)
                    .await
                    .context("connect redis broker")?;
                let schedules = RedisScheduleSource::connect(&taskq.redis_url, &taskq.schedule_prefix)
                    .await
                    .context("connect redis schedule source")?;
                Ok(Self {
                    broker: Arc::new(broker),
                    registry: Arc::new(TaskRegistry::with_builtins(transport_mailer(&cfg.mail))),
                    schedules: Arc::new(schedules),
                })
            }
        }
    }

    pub fn invoker(&self) -> TaskInvoker {
        TaskInvoker::new(self.broker.clone(), self.registry.clone(), self.schedules.clone())
    }

    pub fn scheduler_service(&self) -> SchedulerService {
        SchedulerService::new(self.schedules.clone(), self.registry.clone())
    }

    pub fn worker(&self, cfg: &TaskQueueConfig) -> Worker {
        Worker::new(self.broker.clone(), self.registry.clone(), Duration::from_millis(cfg.poll_interval_ms))
    }

    /// Scheduler over the registry's label schedules plus the dynamic source.
    pub fn scheduler(&self, cfg: &TaskQueueConfig) -> TaskScheduler {
        let labels: Arc<dyn ScheduleSource> = Arc::new(LabelScheduleSource::from_registry(&self.registry));
        TaskScheduler::new(
            vec![labels, self.schedules.clone()],
            self.broker.clone(),
            Duration::from_millis(cfg.scheduler_tick_ms),
        )
    }
}

/// Assemble handler state. Welcome mail goes through the queue whenever something drains it.
pub fn build_state(cfg: &AppConfig, repo: Arc<dyn UserRepository>, infra: &TaskInfra) -> ServerState {
    let keys = JwtKeys::from_config(&cfg.auth);
    let mailer: Arc<dyn Mailer> = if cfg.taskq.embedded || cfg.taskq.broker == BrokerKind::Redis {
        Arc::new(QueueMailer::new(infra.broker.clone()))
    } else {
        transport_mailer(&cfg.mail)
    };
    ServerState {
        users: UserService::new(repo, keys.clone(), mailer),
        invoker: infra.invoker(),
        scheduler: infra.scheduler_service(),
        auth: Arc::new(AuthSettings::new(keys, &cfg.auth.exclude_paths)),
        base_url: cfg.server.base_url.clone(),
    }
}

pub fn build_app(state: ServerState, cfg: &AppConfig) -> Router {
    routes::build_router(state, routes::build_cors(&cfg.cors))
}

/// Start the worker and scheduler loops; both stop when `shutdown` flips.
pub fn spawn_background(
    infra: &TaskInfra,
    cfg: &TaskQueueConfig,
    shutdown: &tokio::sync::watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(infra.worker(cfg).run(shutdown.clone())),
        tokio::spawn(infra.scheduler(cfg).run(shutdown.clone())),
    ]
}

/// Public entry: connect, build the app and serve until Ctrl+C/SIGTERM.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let db = models::db::connect(&cfg.database).await.context("connect database")?;
    let infra = TaskInfra::from_config(&cfg).await?;
    let repo: Arc<dyn UserRepository> = Arc::new(SeaOrmUserRepository::new(db));
    let state = build_state(&cfg, repo, &infra);
    let app = build_app(state, &cfg);

    let (stop_tx, stop_rx) = shutdown_channel();
    let background = if cfg.taskq.embedded {
        info!(broker = infra.broker.name(), "running embedded worker and scheduler");
        spawn_background(&infra, &cfg.taskq, &stop_rx)
    } else {
        Vec::new()
    };

    let addr = cfg.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("bind {addr}"))?;
    info!(%addr, "starting server");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    let _ = stop_tx.send(true);
    for handle in background {
        if let Err(e) = handle.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    info!("server stopped");
    Ok(())
}

/// Standalone worker process.
pub async fn run_worker(cfg: AppConfig) -> anyhow::Result<()> {
    let infra = TaskInfra::from_config(&cfg).await?;
    if cfg.taskq.broker == BrokerKind::Memory {
        warn!("memory broker in a standalone worker only sees its own process");
    }
    let (tx, rx) = shutdown_channel();
    let handle = tokio::spawn(infra.worker(&cfg.taskq).run(rx));
    shutdown_signal().await;
    let _ = tx.send(true);
    handle.await?;
    Ok(())
}

/// Standalone scheduler process.
pub async fn run_scheduler(cfg: AppConfig) -> anyhow::Result<()> {
    let infra = TaskInfra::from_config(&cfg).await?;
    let (tx, rx) = shutdown_channel();
    let handle = tokio::spawn(infra.scheduler(&cfg.taskq).run(rx));
    shutdown_signal().await;
    let _ = tx.send(true);
    handle.await?;
    Ok(())
}
