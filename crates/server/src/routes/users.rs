use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::{Extension, Json};
use serde_json::{json, Value};
use service::users::{ListQuery, LoginRequest, RefreshRequest, RegisterRequest, UpdateUserRequest};
use service::validation::FieldErrors;
use tracing::info;

use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::extract::ValidJson;
use crate::state::ServerState;

/// Configured base URL, else `http://{Host}`.
fn base_url(state: &ServerState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.base_url {
        return url.clone();
    }
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok()).unwrap_or("localhost");
    format!("http://{host}")
}

#[utoipa::path(
    post, path = "/api/v1/users/registration", tag = "users",
    request_body = crate::openapi::RegisterBody,
    responses(
        (status = 201, description = "Registered", body = crate::openapi::UserEnvelopeDoc),
        (status = 400, description = "Email already registered or invalid JSON", body = crate::openapi::ErrorDoc),
        (status = 422, description = "Validation error", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn register(
    State(state): State<ServerState>,
    headers: HeaderMap,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let input = body.validate()?;
    let user = state.users.register(input, &base_url(&state, &headers)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Registration successful", "user": user }))))
}

#[utoipa::path(
    post, path = "/api/v1/users/login", tag = "users",
    request_body = crate::openapi::LoginBody,
    responses(
        (status = 200, description = "Logged in", body = crate::openapi::LoginDoc),
        (status = 401, description = "Invalid credentials", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn login(
    State(state): State<ServerState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let out = state.users.login(body.validate()?).await?;
    Ok(Json(json!({
        "message": "Login successful",
        "user": out.user,
        "type": "Bearer",
        "access_token": out.access_token,
        "refresh_token": out.refresh_token,
    })))
}

#[utoipa::path(
    post, path = "/api/v1/users/token/refresh", tag = "users",
    request_body = crate::openapi::RefreshBody,
    responses(
        (status = 200, description = "New token pair", body = crate::openapi::TokenPairDoc),
        (status = 401, description = "Invalid token", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn refresh(
    State(state): State<ServerState>,
    ValidJson(body): ValidJson<RefreshRequest>,
) -> Result<Json<Value>, ApiError> {
    let Some(token) = body.refresh_token.filter(|t| !t.trim().is_empty()) else {
        let mut errs = FieldErrors::new();
        errs.add("refresh_token", "field required");
        return Err(errs.into());
    };
    let pair = state.users.refresh(token.trim()).await?;
    Ok(Json(json!({
        "message": "Token refreshed",
        "type": "Bearer",
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
    })))
}

#[utoipa::path(
    get, path = "/api/v1/users", tag = "users",
    params(
        ("page" = Option<u64>, Query, description = "1-based page, default 1"),
        ("per_page" = Option<u64>, Query, description = "Page size, default 10, max 100"),
        ("sort_by" = Option<String>, Query, description = "created_at | updated_at | name | email | status"),
        ("sort_order" = Option<String>, Query, description = "asc | desc (default)")
    ),
    responses((status = 200, description = "One page of users", body = crate::openapi::UserListDoc)),
    security(("bearer" = []))
)]
pub async fn list(
    State(state): State<ServerState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let page = state.users.list(query.into()).await?;
    Ok(Json(json!(page)))
}

#[utoipa::path(
    get, path = "/api/v1/users/{id}", tag = "users",
    params(("id" = String, Path, description = "User id (uuid)")),
    responses(
        (status = 200, description = "User", body = crate::openapi::UserDoc),
        (status = 404, description = "User not found", body = crate::openapi::ErrorDoc)
    ),
    security(("bearer" = []))
)]
pub async fn get(State(state): State<ServerState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let user = state.users.get(&id).await?;
    Ok(Json(json!(user)))
}

#[utoipa::path(
    put, path = "/api/v1/users/{id}/update", tag = "users",
    params(("id" = String, Path, description = "User id (uuid)")),
    request_body = crate::openapi::UpdateUserBody,
    responses(
        (status = 200, description = "Updated", body = crate::openapi::UserEnvelopeDoc),
        (status = 400, description = "Email already registered", body = crate::openapi::ErrorDoc),
        (status = 404, description = "User not found", body = crate::openapi::ErrorDoc)
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Extension(actor): Extension<AuthUser>,
    ValidJson(body): ValidJson<UpdateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    let changes = body.validate()?;
    let user = state.users.update(&id, changes).await?;
    info!(actor = %actor.user_id, target = %user.id, "user updated via api");
    Ok(Json(json!({ "message": "User updated successfully", "user": user })))
}

#[utoipa::path(
    delete, path = "/api/v1/users/{id}/delete", tag = "users",
    params(("id" = String, Path, description = "User id (uuid)")),
    responses(
        (status = 200, description = "Deleted", body = crate::openapi::MessageDoc),
        (status = 404, description = "User not found", body = crate::openapi::ErrorDoc)
    ),
    security(("bearer" = []))
)]
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Extension(actor): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    state.users.delete(&id).await?;
    info!(actor = %actor.user_id, target = %id, "user deleted via api");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
