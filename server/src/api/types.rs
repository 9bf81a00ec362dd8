//! Shared API types
//!
//! The error envelope every endpoint renders.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::data::DataError;

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    ServiceUnavailable { message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    pub fn product_not_found() -> Self {
        Self::not_found("PRODUCT_NOT_FOUND", "Product not found")
    }

    pub fn review_not_found() -> Self {
        Self::not_found("REVIEW_NOT_FOUND", "Review not found")
    }

    /// Map a storage failure; details are logged, never returned
    pub fn from_data(e: DataError) -> Self {
        if e.is_transient() {
            tracing::warn!(error = %e, backend = e.backend(), "Database unavailable");
            return Self::service_unavailable("Database temporarily unavailable");
        }
        tracing::error!(error = %e, backend = e.backend(), "Data error");
        Self::internal("Database operation failed")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Conflict { code, message } => (StatusCode::CONFLICT, "conflict", code, message),
            Self::ServiceUnavailable { message } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "SERVICE_UNAVAILABLE".to_string(),
                message,
            ),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::bad_request("X", "x"), StatusCode::BAD_REQUEST),
            (ApiError::product_not_found(), StatusCode::NOT_FOUND),
            (ApiError::conflict("X", "x"), StatusCode::CONFLICT),
            (ApiError::service_unavailable("x"), StatusCode::SERVICE_UNAVAILABLE),
            (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_from_data_transient_is_unavailable() {
        let error = ApiError::from_data(DataError::Sqlite(sqlx::Error::PoolTimedOut));
        assert_eq!(error.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let error = ApiError::from_data(DataError::Config("bad".into()));
        assert_eq!(error.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
