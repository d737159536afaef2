use std::collections::BTreeMap;

use axum::Json;
use serde::Serialize;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

#[derive(ToSchema)]
pub struct HealthDoc {
    pub status: String,
}

#[derive(ToSchema)]
pub struct MessageDoc {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorDoc {
    pub message: String,
    pub status_code: u16,
    #[serde(rename = "type")]
    #[schema(example = "BadRequest")]
    pub kind: String,
    /// Present on 422 only: field name to messages.
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(ToSchema)]
pub struct RegisterBody {
    pub name: Option<String>,
    #[schema(example = "ann@example.com")]
    pub email: String,
    /// At least 8 characters.
    pub password: String,
}

#[derive(ToSchema)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema)]
pub struct RefreshBody {
    pub refresh_token: String,
}

#[derive(ToSchema)]
pub struct UpdateUserBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserDoc {
    #[schema(example = "3f2b4c1e-8d7a-4c55-9d0e-2f4a1b6c7d8e")]
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    #[schema(example = "active")]
    pub status: Option<String>,
}

#[derive(ToSchema)]
pub struct UserEnvelopeDoc {
    pub message: String,
    pub user: UserDoc,
}

#[derive(Serialize, ToSchema)]
pub struct LoginDoc {
    pub message: String,
    pub user: UserDoc,
    #[serde(rename = "type")]
    #[schema(example = "Bearer")]
    pub kind: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenPairDoc {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema)]
pub struct PageMetaDoc {
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

#[derive(ToSchema)]
pub struct UserListDoc {
    pub users: Vec<UserDoc>,
    pub pagination: PageMetaDoc,
    pub active_users: u64,
    pub inactive_users: u64,
}

#[derive(ToSchema)]
pub struct ScheduleBody {
    #[schema(example = "mail_now")]
    pub task_name: String,
    pub schedule_id: Option<String>,
    #[schema(example = "*/5 * * * *")]
    pub cron: Option<String>,
    /// RFC 3339 instant for a one-shot run.
    pub time: Option<String>,
    /// Seconds between runs.
    pub interval: Option<u64>,
    #[schema(value_type = Object)]
    pub labels: Option<serde_json::Value>,
    #[schema(value_type = Vec<Object>)]
    pub args: Option<Vec<serde_json::Value>>,
    #[schema(value_type = Object)]
    pub kwargs: Option<serde_json::Value>,
    pub task_id: Option<String>,
}

#[derive(ToSchema)]
pub struct TaskInfoDoc {
    pub task_name: String,
    pub schedule_id: String,
    pub cron: Option<String>,
    pub task_id: Option<String>,
    pub time: Option<String>,
    pub interval: Option<String>,
}

#[derive(ToSchema)]
pub struct AddScheduleDoc {
    pub success: bool,
    pub message: String,
    pub task_info: Option<TaskInfoDoc>,
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::index::index,
        crate::routes::index::health,
        crate::routes::index::health_check,
        crate::routes::users::register,
        crate::routes::users::login,
        crate::routes::users::refresh,
        crate::routes::users::list,
        crate::routes::users::get,
        crate::routes::users::update,
        crate::routes::users::delete,
        crate::routes::tasks::process_user_registration,
        crate::routes::tasks::add_schedule_task,
        crate::routes::tasks::create_schedule,
        crate::routes::tasks::schedule_list,
        crate::routes::tasks::schedule_get,
        crate::routes::tasks::schedule_remove,
        crate::routes::tasks::schedule_clear_all,
        crate::routes::tasks::schedule_count,
    ),
    components(
        schemas(
            HealthDoc,
            MessageDoc,
            ErrorDoc,
            RegisterBody,
            LoginBody,
            RefreshBody,
            UpdateUserBody,
            UserDoc,
            UserEnvelopeDoc,
            LoginDoc,
            TokenPairDoc,
            PageMetaDoc,
            UserListDoc,
            ScheduleBody,
            TaskInfoDoc,
            AddScheduleDoc,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "index"),
        (name = "health"),
        (name = "users"),
        (name = "tasks")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_user_and_task_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| *p == "/api/v1/users/registration"));
        assert!(paths.iter().any(|p| *p == "/api/v1/tasks/schedule-list"));
        assert!(doc.components.as_ref().unwrap().security_schemes.contains_key("bearer"));
    }
}
