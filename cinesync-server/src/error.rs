//! HTTP error mapping (§7). Every handler returns `AppResult<T>`; this is
//! the one place that turns a `cinesync_core::Error` (or a validation
//! failure noticed in the handler itself) into a status code and the
//! `{"error": {"message", "status"}}` envelope the UI expects.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));
        (self.status, body).into_response()
    }
}

/// §7's error-kind table, mapped onto HTTP status (kind 1 Transient never
/// reaches here — it's absorbed by `retry::with_retry` before escaping
/// `cinesync-core`).
impl From<cinesync_core::Error> for AppError {
    fn from(err: cinesync_core::Error) -> Self {
        use cinesync_core::Error as CoreError;
        match err {
            CoreError::NotFound(msg) => Self::not_found(msg),
            CoreError::Validation(msg) => Self::bad_request(msg),
            CoreError::Unauthorized => Self::unauthorized("unauthorized"),
            CoreError::Config(msg) => Self::internal(msg),
            CoreError::Subprocess(msg) => Self::internal(msg),
            CoreError::Db(e) => Self::internal(e.to_string()),
            CoreError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl From<cinesync_model::error::Error> for AppError {
    fn from(err: cinesync_model::error::Error) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err.to_string())
    }
}
