use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest { message: &'static str },
    #[error("not found: {message}")]
    NotFound { message: &'static str },
    #[error("method or path not allowed")]
    MethodNotAllowed,
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Failure to push a notification or response down an open stream.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("event stream closed")]
    Closed,
    #[error("session {0} is no longer registered")]
    SessionGone(String),
    #[error("failed to encode event payload: {0}")]
    Encode(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn bad_request(message: &'static str) -> Self {
        Self::BadRequest { message }
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::NotFound { message }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest { message } => (StatusCode::BAD_REQUEST, message.to_string()),
            Self::NotFound { message } => (StatusCode::NOT_FOUND, message.to_string()),
            Self::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method or Path not allowed".to_string(),
            ),
            Self::Internal { message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        tracing::debug!(status = status.as_u16(), error = %message, "sending error response");
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
