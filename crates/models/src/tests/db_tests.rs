use std::time::{Duration, Instant};

use anyhow::Result;
use configs::DatabaseConfig;
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

use super::test_db;
use crate::db::{connect, connect_options, ping};

#[test]
fn connect_options_follow_config() {
    let cfg = DatabaseConfig {
        url: "postgres://u:p@localhost/app".into(),
        max_connections: 7,
        min_connections: 3,
        connect_timeout_secs: 5,
        ..Default::default()
    };
    let opt = connect_options(&cfg);
    assert_eq!(opt.get_url(), "postgres://u:p@localhost/app");
    assert_eq!(opt.get_max_connections(), Some(7));
    assert_eq!(opt.get_min_connections(), Some(3));
    assert_eq!(opt.get_connect_timeout(), Some(Duration::from_secs(5)));
}

#[tokio::test]
async fn test_basic_connection() -> Result<()> {
    let Some(db) = test_db().await else { return Ok(()) };

    let start = Instant::now();
    ping(&db).await?;
    let stmt = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1 as test".to_string());
    let row = db.query_one(stmt).await?.expect("one row");
    let value: i32 = row.try_get("", "test")?;
    assert_eq!(value, 1);
    assert!(start.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn test_small_pool_serves_concurrent_queries() -> Result<()> {
    if test_db().await.is_none() {
        return Ok(());
    }
    let cfg = DatabaseConfig {
        url: std::env::var("DATABASE_URL")?,
        max_connections: 2,
        min_connections: 1,
        ..Default::default()
    };
    let db = connect(&cfg).await?;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let db = db.clone();
        handles.push(tokio::spawn(async move { ping(&db).await }));
    }
    for h in handles {
        h.await??;
    }
    Ok(())
}
