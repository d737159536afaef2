use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use service::errors::ServiceError;
use service::validation::FieldErrors;
use thiserror::Error;
use tracing::error;

/// Error returned by handlers, rendered as `{"message", "status_code", "type"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error")]
    Validation(FieldErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Internal(_) => "InternalServerError",
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(errs) => ApiError::Validation(errs),
            ServiceError::BadRequest(m) => ApiError::BadRequest(m),
            ServiceError::Unauthorized(m) => ApiError::Unauthorized(m),
            ServiceError::NotFound(m) => ApiError::NotFound(m),
            other => {
                error!(code = other.code(), error = %other, "service failure");
                ApiError::Internal("Internal server error".into())
            }
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errs: FieldErrors) -> Self {
        ApiError::Validation(errs)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "message": self.to_string(),
            "status_code": status.as_u16(),
            "type": self.kind(),
        });
        if let ApiError::Validation(errs) = &self {
            body["errors"] = json!(errs);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_carry_field_map() {
        let mut errs = FieldErrors::new();
        errs.add("email", "field required");
        let (status, body) = body_of(ApiError::from(errs)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Validation error");
        assert_eq!(body["errors"]["email"][0], "email field required");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let err = ApiError::from(ServiceError::Hash("boom".into()));
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["status_code"], 500);
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let (status, body) = body_of(ApiError::from(ServiceError::user_not_found())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");
        assert_eq!(body["type"], "NotFound");
    }
}
