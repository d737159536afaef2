use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use configs::AppConfig;
use migration::{Migrator, MigratorTrait};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "user-backend", version, about = "User management API with a background task queue")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Run a standalone task worker.
    Worker,
    /// Run a standalone scheduler.
    Scheduler,
    /// Apply or inspect database migrations.
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Write an empty migration and register it with the migrator.
    MakeRevision {
        message: String,
        #[arg(long, default_value = "crates/migration/src")]
        dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations.
    Up,
    /// Roll back the last applied migration.
    Down,
    Status,
    /// Drop all tables and reapply everything.
    Fresh,
    /// Roll back everything, then reapply.
    Refresh,
    /// Roll back everything.
    Reset,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Serve => "serve",
            Command::Worker => "worker",
            Command::Scheduler => "scheduler",
            Command::Migrate { .. } => "migrate",
            Command::MakeRevision { .. } => "make-revision",
        }
    }
}

async fn migrate(cfg: &AppConfig, action: MigrateAction) -> anyhow::Result<()> {
    let db = models::db::connect(&cfg.database).await.context("connect database")?;
    match action {
        MigrateAction::Up => Migrator::up(&db, None).await?,
        MigrateAction::Down => Migrator::down(&db, Some(1)).await?,
        MigrateAction::Status => Migrator::status(&db).await?,
        MigrateAction::Fresh => Migrator::fresh(&db).await?,
        MigrateAction::Refresh => Migrator::refresh(&db).await?,
        MigrateAction::Reset => Migrator::reset(&db).await?,
    }
    info!(action = ?action, "migration command finished");
    Ok(())
}

async fn dispatch(command: Command, cfg: AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Serve => server::run(cfg).await,
        Command::Worker => server::run_worker(cfg).await,
        Command::Scheduler => server::run_scheduler(cfg).await,
        Command::Migrate { action } => migrate(&cfg, action).await,
        Command::MakeRevision { message, dir } => {
            let path = migration::revision::generate_revision(&dir, &message, chrono::Utc::now())?;
            info!(file = %path.display(), "migration created");
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    common::utils::logging::init_logging_from_env();

    let command = cli.command.unwrap_or(Command::Serve);
    let service_id = Uuid::new_v4();
    let pid = std::process::id();

    std::panic::set_hook(Box::new(move |info| {
        error!(service = "user-backend", event = "panic", %service_id, pid, message = %info, "unhandled panic occurred");
    }));

    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(event = "config_invalid", error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(w) = cfg.server.worker_threads {
        builder.worker_threads(w);
    }
    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let name = command.name();
    info!(
        service = "user-backend",
        event = "start",
        command = name,
        %service_id,
        pid,
        version = env!("CARGO_PKG_VERSION"),
        threads = cfg.server.worker_threads.unwrap_or_default(),
        "starting"
    );

    match rt.block_on(dispatch(command, cfg)) {
        Ok(()) => {
            info!(service = "user-backend", event = "stop", command = name, %service_id, "stopped normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(service = "user-backend", event = "run_failed", command = name, error = %format!("{e:#}"), "command failed");
            ExitCode::FAILURE
        }
    }
}
