use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use service::validation::FieldErrors;
use tracing::debug;

use crate::errors::ApiError;

/// `Json<T>` whose rejections render as `ApiError`.
///
/// Unparsable bodies are `400 Invalid JSON`; well-formed JSON with wrong field types is a 422.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(JsonRejection::JsonDataError(e)) => {
                debug!(error = %e.body_text(), "json body has wrong shape");
                let mut errs = FieldErrors::new();
                errs.add("body", e.body_text());
                Err(ApiError::Validation(errs))
            }
            Err(e) => {
                debug!(error = %e.body_text(), "json body rejected");
                Err(ApiError::BadRequest("Invalid JSON".into()))
            }
        }
    }
}
