use axum::Json;
use common::types::{Health, MessageBody};

#[utoipa::path(get, path = "/", tag = "index", responses((status = 200, description = "API is running", body = crate::openapi::MessageDoc)))]
pub async fn index() -> Json<MessageBody> {
    Json(MessageBody::new("API is running..."))
}

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "Service is healthy", body = crate::openapi::HealthDoc)))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[utoipa::path(get, path = "/health/check", tag = "health", responses((status = 200, description = "Health check", body = crate::openapi::HealthDoc)))]
pub async fn health_check() -> Json<Health> {
    Json(Health { status: "check ok" })
}
