//! Path, query and body extractors for API routes
//!
//! Every rejection renders the same `{error, code, message}` envelope as
//! `ApiError`, so clients see one error shape regardless of where a request
//! failed.

use std::ops::Deref;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::core::constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

/// Parse a decimal id from a path segment
fn parse_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

/// Raw path extractor for product routes (internal use)
#[derive(Debug, Deserialize)]
struct ProductPathRaw {
    product_id: String,
}

/// Validated product path extractor.
///
/// Returns a 400 Bad Request if `product_id` is not a decimal integer.
#[derive(Debug)]
pub struct ProductPath {
    pub product_id: i64,
}

impl<S> FromRequestParts<S> for ProductPath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<ProductPathRaw>::from_request_parts(parts, state)
            .await
            .map_err(|_| ValidationRejection::InvalidProductId)?;

        let product_id = parse_id(&raw.product_id).ok_or(ValidationRejection::InvalidProductId)?;
        Ok(Self { product_id })
    }
}

/// Raw path extractor for single-review routes (internal use)
#[derive(Debug, Deserialize)]
struct ReviewPathRaw {
    product_id: String,
    review_id: String,
}

/// Validated review path extractor.
///
/// The product id is checked before the review id, so a request with both
/// malformed reports the product.
#[derive(Debug)]
pub struct ReviewPath {
    pub product_id: i64,
    pub review_id: i64,
}

impl<S> FromRequestParts<S> for ReviewPath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<ReviewPathRaw>::from_request_parts(parts, state)
            .await
            .map_err(|_| ValidationRejection::InvalidProductId)?;

        let product_id = parse_id(&raw.product_id).ok_or(ValidationRejection::InvalidProductId)?;
        let review_id = parse_id(&raw.review_id).ok_or(ValidationRejection::InvalidReviewId)?;
        Ok(Self {
            product_id,
            review_id,
        })
    }
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Deserialize)]
struct PaginationRaw {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// `limit`/`offset` query parameters, clamped rather than rejected.
///
/// `limit` defaults to 10 and is clamped to 1..=100; `offset` defaults to 0
/// and negative values become 0. Non-numeric values are a 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    fn clamped(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<PaginationRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Query)?;
        Ok(Self::clamped(raw.limit, raw.offset))
    }
}

// ============================================================================
// Rejections
// ============================================================================

/// Validation rejection with structured error response
#[derive(Debug)]
pub enum ValidationRejection {
    /// Product id segment is not an integer
    InvalidProductId,
    /// Review id segment is not an integer
    InvalidReviewId,
    /// Failed to parse query string
    Query(QueryRejection),
    /// Failed to parse JSON body
    Json(JsonRejection),
    /// Validation constraints not satisfied
    Validation(validator::ValidationErrors),
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            Self::InvalidProductId => ("INVALID_PRODUCT_ID", "Invalid product ID".to_string()),
            Self::InvalidReviewId => ("INVALID_REVIEW_ID", "Invalid review ID".to_string()),
            Self::Query(rejection) => ("QUERY_PARSE_ERROR", rejection.body_text()),
            Self::Json(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "Rejected request body");
                ("JSON_PARSE_ERROR", "Invalid request body".to_string())
            }
            Self::Validation(errors) => ("VALIDATION_ERROR", format_validation_errors(&errors)),
        };
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "bad_request",
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: validation failed", field))
            })
        })
        .collect();
    // field_errors() is a map; keep output stable across runs
    messages.sort();
    messages.join("; ")
}

/// JSON body extractor with automatic validation.
///
/// Deserializes JSON body and validates it using the `validator` crate.
/// Returns a `ValidationRejection` on parse or validation failure.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T> Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidationRejection::Json)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}
