/// Connection and pool tests
pub mod db_tests;

/// `users` entity CRUD against a live database
pub mod crud_tests;

use sea_orm::DatabaseConnection;

/// Connect and migrate, or `None` when no database is configured for tests.
pub(crate) async fn test_db() -> Option<DatabaseConnection> {
    use migration::MigratorTrait;

    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return None;
    }
    let url = std::env::var("DATABASE_URL").ok()?;
    let db = match crate::db::connect_url(&url).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("skip: cannot connect to db: {e}");
            return None;
        }
    };
    if let Err(e) = migration::Migrator::up(&db, None).await {
        eprintln!("skip: migrate up failed: {e}");
        return None;
    }
    Some(db)
}
