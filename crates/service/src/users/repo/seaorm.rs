use chrono::Utc;
use models::user;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::pagination::SortOrder;
use crate::users::domain::{ListParams, NewUser, UserChanges};
use crate::users::repository::UserRepository;

pub struct SeaOrmUserRepository {
    pub db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// The only unique column on `users` is `email`; a concurrent insert that
/// slips past the service's lookup surfaces here.
fn map_write_err(e: DbErr) -> ServiceError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::BadRequest("Email already registered".into()),
        _ => ServiceError::Db(e),
    }
}

#[async_trait::async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email.to_string()))
            .one(&self.db)
            .await?)
    }

    async fn create(&self, new_user: NewUser) -> Result<user::Model, ServiceError> {
        let now = Utc::now().into();
        let am = user::ActiveModel {
            id: Set(new_user.id),
            name: Set(new_user.name),
            email: Set(Some(new_user.email)),
            password: Set(Some(new_user.password_hash)),
            status: Set(Some(new_user.status)),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        };
        am.insert(&self.db).await.map_err(map_write_err)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<user::Model>, ServiceError> {
        let Some(found) = user::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        let mut am = found.into_active_model();
        if let Some(name) = changes.name {
            am.name = Set(Some(name));
        }
        if let Some(email) = changes.email {
            am.email = Set(Some(email));
        }
        if let Some(password) = changes.password {
            am.password = Set(Some(password));
        }
        am.updated_at = Set(Utc::now().into());
        am.update(&self.db).await.map(Some).map_err(map_write_err)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        let res = user::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(res.rows_affected > 0)
    }

    async fn list(&self, params: ListParams) -> Result<(Vec<user::Model>, u64), ServiceError> {
        let col = params.sort.column();
        let query = match params.order {
            SortOrder::Asc => user::Entity::find().order_by_asc(col).order_by_asc(user::Column::Id),
            SortOrder::Desc => user::Entity::find().order_by_desc(col).order_by_desc(user::Column::Id),
        };
        let (idx, per) = params.pagination.normalize();
        let paginator = query.paginate(&self.db, per);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(idx).await?;
        Ok((rows, total))
    }
}
