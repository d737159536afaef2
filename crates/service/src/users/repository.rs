use async_trait::async_trait;
use models::user;
use uuid::Uuid;

use super::domain::{ListParams, NewUser, UserChanges};
use crate::errors::ServiceError;

/// Repository abstraction for user persistence.
///
/// `UserChanges::password` arrives here already hashed.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<user::Model>, ServiceError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError>;
    async fn create(&self, new_user: NewUser) -> Result<user::Model, ServiceError>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<user::Model>, ServiceError>;
    /// `false` when no row matched.
    async fn delete(&self, id: Uuid) -> Result<bool, ServiceError>;
    /// One page plus the total row count.
    async fn list(&self, params: ListParams) -> Result<(Vec<user::Model>, u64), ServiceError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use crate::pagination::SortOrder;
    use crate::users::domain::SortField;
    use chrono::Utc;
    use std::cmp::Ordering;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockUserRepository {
        users: Mutex<HashMap<Uuid, user::Model>>,
    }

    impl MockUserRepository {
        pub fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Insert a fully formed row, bypassing the service.
        pub fn insert_raw(&self, model: user::Model) {
            self.users.lock().unwrap().insert(model.id, model);
        }
    }

    fn compare(a: &user::Model, b: &user::Model, field: SortField) -> Ordering {
        match field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Name => a.name.cmp(&b.name),
            SortField::Email => a.email.cmp(&b.email),
            SortField::Status => a.status.cmp(&b.status),
        }
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<user::Model>, ServiceError> {
            Ok(self.users.lock().unwrap().get(&id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
            let users = self.users.lock().unwrap();
            Ok(users.values().find(|u| u.email.as_deref() == Some(email)).cloned())
        }

        async fn create(&self, new_user: NewUser) -> Result<user::Model, ServiceError> {
            let mut users = self.users.lock().unwrap();
            if users.values().any(|u| u.email.as_deref() == Some(new_user.email.as_str())) {
                return Err(ServiceError::BadRequest("Email already registered".into()));
            }
            let now = Utc::now().into();
            let model = user::Model {
                id: new_user.id,
                name: new_user.name,
                email: Some(new_user.email),
                password: Some(new_user.password_hash),
                status: Some(new_user.status),
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            users.insert(model.id, model.clone());
            Ok(model)
        }

        async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<user::Model>, ServiceError> {
            let mut users = self.users.lock().unwrap();
            let Some(found) = users.get_mut(&id) else { return Ok(None) };
            if let Some(name) = changes.name {
                found.name = Some(name);
            }
            if let Some(email) = changes.email {
                found.email = Some(email);
            }
            if let Some(password) = changes.password {
                found.password = Some(password);
            }
            found.updated_at = Utc::now().into();
            Ok(Some(found.clone()))
        }

        async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
            Ok(self.users.lock().unwrap().remove(&id).is_some())
        }

        async fn list(&self, params: ListParams) -> Result<(Vec<user::Model>, u64), ServiceError> {
            let users = self.users.lock().unwrap();
            let mut all: Vec<user::Model> = users.values().cloned().collect();
            all.sort_by(|a, b| {
                let ord = compare(a, b, params.sort).then_with(|| a.id.cmp(&b.id));
                match params.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
            let total = all.len() as u64;
            let (idx, per) = params.pagination.normalize();
            let page = all.into_iter().skip(usize::try_from(idx * per).unwrap_or(usize::MAX)).take(per as usize).collect();
            Ok((page, total))
        }
    }
}
