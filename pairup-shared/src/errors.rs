use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: Identity errors
/// - E3xxx: Swipe errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    ValidationError,
    Unauthorized,
    RateLimited,
    ServiceUnavailable,

    // Auth (E1xxx)
    TokenExpired,
    TokenInvalid,

    // Identity (E2xxx)
    IdentityNotFound,
    IdentityAlreadyExists,

    // Swipe (E3xxx)
    InvalidEdge,
    AlreadyMatched,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::ValidationError => "E0002",
            Self::Unauthorized => "E0004",
            Self::RateLimited => "E0006",
            Self::ServiceUnavailable => "E0007",

            // Auth
            Self::TokenExpired => "E1001",
            Self::TokenInvalid => "E1002",

            // Identity
            Self::IdentityNotFound => "E2001",
            Self::IdentityAlreadyExists => "E2002",

            // Swipe
            Self::InvalidEdge => "E3001",
            Self::AlreadyMatched => "E3002",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationError | Self::InvalidEdge => StatusCode::BAD_REQUEST,
            Self::IdentityNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::IdentityAlreadyExists | Self::AlreadyMatched => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();

        if status.is_server_error() {
            tracing::error!(code = self.code.code(), status = status.as_u16(), "{}", self.message);
        } else {
            tracing::debug!(code = self.code.code(), status = status.as_u16(), "{}", self.message);
        }

        let mut resp = ApiErrorResponse::new(self.code.code(), self.message);
        if let Some(d) = self.details {
            resp = resp.with_details(d);
        }

        (status, Json(resp)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
