use thiserror::Error;

use crate::validation::FieldErrors;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error")]
    Validation(FieldErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("hashing error: {0}")]
    Hash(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("model error: {0}")]
    Model(#[from] models::errors::ModelError),
    #[error("mail error: {0}")]
    Mail(#[from] crate::mail::MailError),
    #[error("task error: {0}")]
    Task(#[from] crate::tasks::TaskError),
    #[error("schedule error: {0}")]
    Schedule(#[from] crate::scheduler::ScheduleError),
}

impl ServiceError {
    pub fn user_not_found() -> Self {
        Self::NotFound("User not found".into())
    }

    pub fn invalid_credentials() -> Self {
        Self::Unauthorized("Invalid credentials".into())
    }

    /// Stable numeric code for logs.
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 1001,
            ServiceError::BadRequest(_) => 1002,
            ServiceError::NotFound(_) => 1003,
            ServiceError::Unauthorized(_) => 1004,
            ServiceError::Hash(_) => 1101,
            ServiceError::Token(_) => 1102,
            ServiceError::Db(_) | ServiceError::Model(_) => 1200,
            ServiceError::Mail(_) => 1300,
            ServiceError::Task(_) | ServiceError::Schedule(_) => 1400,
        }
    }
}
