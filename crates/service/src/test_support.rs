use migration::MigratorTrait;
use sea_orm::DatabaseConnection;
use tokio::sync::OnceCell;

// Migrations run once per test process
static MIGRATED: OnceCell<bool> = OnceCell::const_new();

fn database_url() -> Option<String> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return None;
    }
    std::env::var("DATABASE_URL").ok()
}

/// `None` when Redis tests are disabled or no `REDIS_URL` is set.
pub fn redis_url() -> Option<String> {
    if std::env::var("SKIP_REDIS_TESTS").is_ok() {
        return None;
    }
    std::env::var("REDIS_URL").ok()
}

/// Fresh connection to a migrated database, or `None` to skip.
pub async fn get_db() -> Option<DatabaseConnection> {
    let url = database_url()?;
    let migrated = MIGRATED
        .get_or_init(|| async {
            let Ok(db) = models::db::connect_url(&url).await else { return false };
            migration::Migrator::up(&db, None).await.is_ok()
        })
        .await;
    if !*migrated {
        eprintln!("skip: database not reachable or migration failed");
        return None;
    }
    models::db::connect_url(&url).await.ok()
}
