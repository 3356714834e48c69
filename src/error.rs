use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::crypt::CryptError;
use crate::objectstore::ObjectStoreError;

/// Error kinds for the whole pipeline: `InvalidInput / NotFound / Crypto /
/// StoreIO / DbIO / Decode / Exhausted`, plus a catch-all `Internal`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("object store error: {0}")]
    StoreIO(String),
    #[error("database error: {0}")]
    DbIO(#[from] sqlx::Error),
    #[error("image decode error: {0}")]
    Decode(String),
    #[error("reprocess retry budget exhausted")]
    Exhausted,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CryptError> for AppError {
    fn from(e: CryptError) -> Self {
        AppError::Crypto(e.to_string())
    }
}

impl From<ObjectStoreError> for AppError {
    fn from(e: ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::NotFound(_) => AppError::NotFound,
            ObjectStoreError::Other(msg) => AppError::StoreIO(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::InvalidInput(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Crypto(_) => {
                tracing::error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".into())
            }
            AppError::StoreIO(_) => {
                tracing::error!("{}", self);
                (StatusCode::BAD_GATEWAY, "object store unavailable".into())
            }
            AppError::DbIO(e) => {
                tracing::error!("database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".into())
            }
            AppError::Decode(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Exhausted => (StatusCode::CONFLICT, self.to_string()),
            AppError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".into())
            }
        };
        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
