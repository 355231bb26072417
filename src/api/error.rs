//! JSON error responses.
//!
//! Internal failures are logged with their full cause here and reach the
//! client only as a generic message.

use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::conversation::ServiceError;
use crate::services::search::SearchError;
use crate::services::translation::TranslationError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code ("bad_request", "not_found", ...).
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 - missing or invalid input.
    BadRequest(String),
    /// 404 - resource does not exist.
    NotFound(String),
    /// 500 - storage or model failure; the message is deliberately generic.
    Internal(String),
}

impl ApiError {
    /// Log `err` and hide it behind `message`.
    pub fn internal(message: &str, err: impl Display) -> Self {
        tracing::error!("{}: {}", message, err);
        ApiError::Internal(message.to_string())
    }

    /// Map a service failure, using `message` for anything internal.
    pub fn from_service(err: ServiceError, message: &str) -> Self {
        match err {
            ServiceError::Validation(e) => ApiError::BadRequest(e.to_string()),
            ServiceError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            other => ApiError::internal(message, other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::EmptyQuery => ApiError::BadRequest("Query q required".to_string()),
            other => ApiError::internal("Search failed", other),
        }
    }
}

impl From<TranslationError> for ApiError {
    fn from(err: TranslationError) -> Self {
        ApiError::internal("Translation failed", err)
    }
}
