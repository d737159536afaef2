use models::user::{self, normalize_email, validate_email, validate_name, validate_password};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::TokenSubject;
use crate::pagination::{PageMeta, Pagination, SortOrder};
use crate::validation::FieldErrors;

/// Registration body as received; every field optional so missing ones surface as field errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<RegisterInput, FieldErrors> {
        let mut errs = FieldErrors::new();
        let name = self.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if let Some(n) = &name {
            if let Err(e) = validate_name(n) {
                errs.add("name", model_message(e));
            }
        }
        let email = match self.email.as_deref().map(str::trim) {
            None | Some("") => {
                errs.add("email", "field required");
                String::new()
            }
            Some(e) => {
                if let Err(err) = validate_email(e) {
                    errs.add("email", model_message(err));
                }
                normalize_email(e)
            }
        };
        let password = match self.password {
            None => {
                errs.add("password", "field required");
                String::new()
            }
            Some(p) => {
                if let Err(e) = validate_password(&p) {
                    errs.add("password", model_message(e));
                }
                p
            }
        };
        errs.into_result(RegisterInput { name, email, password })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(self) -> Result<LoginInput, FieldErrors> {
        let mut errs = FieldErrors::new();
        let email = self.email.map(|e| e.trim().to_string()).unwrap_or_default();
        if email.is_empty() {
            errs.add("email", "field required");
        }
        let password = self.password.unwrap_or_default();
        if password.is_empty() {
            errs.add("password", "field required");
        }
        errs.into_result(LoginInput { email: normalize_email(&email), password })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Update body; empty strings count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated changes. `password` holds the plain text until the service hashes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

impl UpdateUserRequest {
    pub fn validate(self) -> Result<UserChanges, FieldErrors> {
        let mut errs = FieldErrors::new();
        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let name = non_empty(self.name);
        if let Some(n) = &name {
            if let Err(e) = validate_name(n) {
                errs.add("name", model_message(e));
            }
        }
        let email = non_empty(self.email);
        if let Some(e) = &email {
            if let Err(err) = validate_email(e) {
                errs.add("email", model_message(err));
            }
        }
        let password = self.password.filter(|p| !p.is_empty());
        if let Some(p) = &password {
            if let Err(e) = validate_password(p) {
                errs.add("password", model_message(e));
            }
        }
        errs.into_result(UserChanges { name, email: email.map(|e| normalize_email(&e)), password })
    }
}

fn model_message(e: models::errors::ModelError) -> String {
    match e {
        models::errors::ModelError::Validation(m) => m,
        other => other.to_string(),
    }
}

/// Row to insert; password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub status: String,
}

/// Public user representation. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
}

impl From<&user::Model> for UserView {
    fn from(m: &user::Model) -> Self {
        Self { id: m.id.to_string(), name: m.name.clone(), email: m.email.clone(), status: m.status.clone() }
    }
}

impl From<&UserView> for TokenSubject {
    fn from(v: &UserView) -> Self {
        Self { user_id: v.id.clone(), name: v.name.clone(), email: v.email.clone(), status: v.status.clone() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
    Email,
    Status,
}

impl SortField {
    /// Unknown names fall back to `created_at`.
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some("updated_at") => SortField::UpdatedAt,
            Some("name") => SortField::Name,
            Some("email") => SortField::Email,
            Some("status") => SortField::Status,
            _ => SortField::CreatedAt,
        }
    }

    pub fn column(&self) -> user::Column {
        match self {
            SortField::CreatedAt => user::Column::CreatedAt,
            SortField::UpdatedAt => user::Column::UpdatedAt,
            SortField::Name => user::Column::Name,
            SortField::Email => user::Column::Email,
            SortField::Status => user::Column::Status,
        }
    }
}

/// Raw list query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListParams {
    pub pagination: Pagination,
    pub sort: SortField,
    pub order: SortOrder,
}

impl From<ListQuery> for ListParams {
    fn from(q: ListQuery) -> Self {
        Self {
            pagination: Pagination::from_query(q.page, q.per_page),
            sort: SortField::parse(q.sort_by.as_deref()),
            order: SortOrder::parse(q.sort_order.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<UserView>,
    pub pagination: PageMeta,
    pub active_users: u64,
    pub inactive_users: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutput {
    pub user: UserView,
    pub access_token: String,
    pub refresh_token: String,
}
