use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use service::auth::{Claims, TokenKind};
use tracing::warn;

use crate::state::ServerState;

/// Identity of the caller, inserted into request extensions by [`require_bearer_token`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub claims: Claims,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self { user_id: claims.user_id.clone(), email: claims.email.clone(), claims }
    }
}

fn unauthorized(path: &str, message: &str) -> Response {
    let body = json!({
        "message": message,
        "status_code": StatusCode::UNAUTHORIZED.as_u16(),
        "path": path,
        "type": "Unauthorized",
        "timestamp": Utc::now().to_rfc3339(),
    });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Global middleware: every request except excluded paths and CORS preflight
/// needs `Authorization: Bearer <access token>`.
pub async fn require_bearer_token(State(state): State<ServerState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if req.method() == Method::OPTIONS || state.auth.is_excluded(&path) {
        return next.run(req).await;
    }

    let Some(authz) = req.headers().get(header::AUTHORIZATION) else {
        warn!(path = %path, "missing Authorization header");
        return unauthorized(&path, "No authorization header");
    };
    let authz = authz.to_str().unwrap_or_default();
    let Some((scheme, token)) = authz.split_once(' ') else {
        warn!(path = %path, "malformed Authorization header");
        return unauthorized(&path, "Invalid authentication scheme");
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        warn!(path = %path, scheme = %scheme, "unsupported authentication scheme");
        return unauthorized(&path, "Invalid authentication scheme");
    }

    match state.auth.keys.decode(token.trim(), TokenKind::Access) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthUser::from(claims));
            next.run(req).await
        }
        Err(e) => {
            warn!(path = %path, error = %e, "token validation failed");
            unauthorized(&path, "Invalid token")
        }
    }
}
