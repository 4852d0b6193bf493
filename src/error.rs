/*
Error taxonomy shared by the economy rules and the HTTP layer.

Every variant is recoverable and maps to one machine-readable kind.
*/

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} already completed")]
    AlreadyCompleted(&'static str),

    #[error("Habit already completed today")]
    AlreadyCompletedToday,

    #[error("Insufficient coins: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("Premium subscription required {0}")]
    PremiumRequired(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("Account is busy, retry the request")]
    Busy,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyCompleted(_) => "already_completed",
            Self::AlreadyCompletedToday => "already_completed_today",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::PremiumRequired(_) => "premium_required",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::AlreadyExists(_) => "already_exists",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Busy => "busy",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyCompleted(_)
            | Self::AlreadyCompletedToday
            | Self::InsufficientFunds { .. }
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::PremiumRequired(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Busy => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Only lock timeouts are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(kind = self.kind(), "request failed: {}", self);
        }
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
            "retryable": self.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout(_) => Self::Busy,
            StoreError::UnknownUser(_) => Self::NotFound("User"),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(AppError::AlreadyCompleted("Task").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::AlreadyCompletedToday.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InsufficientFunds { balance: 1, required: 2 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::PremiumRequired("").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("Task").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Busy.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn only_busy_is_retryable() {
        assert!(AppError::Busy.is_retryable());
        assert!(!AppError::AlreadyCompletedToday.is_retryable());
        assert!(!AppError::validation("bad").is_retryable());
    }

    #[test]
    fn lock_timeout_maps_to_busy() {
        let err: AppError = StoreError::LockTimeout(uuid::Uuid::nil()).into();
        assert_eq!(err.kind(), "busy");
    }
}
