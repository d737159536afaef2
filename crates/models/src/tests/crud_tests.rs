use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

use super::test_db;
use crate::user::{self, UserStatus};

fn new_user(email: &str) -> user::ActiveModel {
    let now = Utc::now().into();
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(Some("Crud User".into())),
        email: Set(Some(email.to_string())),
        password: Set(Some("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into())),
        status: Set(Some(UserStatus::Active.as_str().into())),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    }
}

#[tokio::test]
async fn test_user_crud() -> Result<()> {
    let Some(db) = test_db().await else { return Ok(()) };

    let email = format!("crud_{}@example.com", Uuid::new_v4().simple());
    let created = new_user(&email).insert(&db).await?;
    assert!(created.is_active());

    let found = user::Entity::find()
        .filter(user::Column::Email.eq(email.clone()))
        .one(&db)
        .await?
        .expect("inserted user");
    assert_eq!(found.id, created.id);

    let mut am: user::ActiveModel = found.into();
    am.status = Set(Some(UserStatus::Inactive.as_str().into()));
    am.updated_at = Set(Utc::now().into());
    let updated = am.update(&db).await?;
    assert!(!updated.is_active());

    user::Entity::delete_by_id(created.id).exec(&db).await?;
    assert!(user::Entity::find_by_id(created.id).one(&db).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_email_rejected_by_unique_index() -> Result<()> {
    let Some(db) = test_db().await else { return Ok(()) };

    let email = format!("dup_{}@example.com", Uuid::new_v4().simple());
    let first = new_user(&email).insert(&db).await?;
    assert!(new_user(&email).insert(&db).await.is_err());

    let count = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .count(&db)
        .await?;
    assert_eq!(count, 1);

    user::Entity::delete_by_id(first.id).exec(&db).await?;
    Ok(())
}
