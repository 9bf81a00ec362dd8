//! Review API endpoints
//!
//! Reads go through the review cache. Every committed mutation drops all
//! cached pages and the rating of its product, then publishes an event.

pub mod types;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};

use types::{ReviewDto, ReviewRequest};

use crate::api::extractors::{Pagination, ProductPath, ReviewPath, ValidatedJson};
use crate::api::types::ApiError;
use crate::data::TransactionalService;
use crate::data::cache::ReviewCache;
use crate::data::events::{EventService, EventType, ReviewEvent};

/// Shared state for Reviews API endpoints
#[derive(Clone)]
pub struct ReviewsApiState {
    pub database: Arc<TransactionalService>,
    pub reviews: ReviewCache,
    pub events: EventService,
}

/// Build Reviews API routes, nested under `/products`
pub fn routes(
    database: Arc<TransactionalService>,
    reviews: ReviewCache,
    events: EventService,
) -> Router<()> {
    let state = ReviewsApiState {
        database,
        reviews,
        events,
    };

    Router::new()
        .route(
            "/{product_id}/reviews",
            get(list_reviews).post(create_review),
        )
        .route(
            "/{product_id}/reviews/{review_id}",
            put(update_review).delete(delete_review),
        )
        .with_state(state)
}

/// List a product's reviews, newest first
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}/reviews",
    tag = "reviews",
    params(
        ("product_id" = String, Path, description = "Product ID"),
        ("limit" = Option<i64>, Query, description = "Items per page (1-100, default 10)"),
        ("offset" = Option<i64>, Query, description = "Items to skip (default 0)")
    ),
    responses(
        (status = 200, description = "Page of reviews", body = Vec<ReviewDto>),
        (status = 400, description = "Invalid product ID or query"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn list_reviews(
    State(state): State<ReviewsApiState>,
    path: ProductPath,
    page: Pagination,
) -> Result<Json<Vec<ReviewDto>>, ApiError> {
    let product_id = path.product_id;

    if let Some(cached) = state
        .reviews
        .get_reviews(product_id, page.limit, page.offset)
        .await
    {
        return Ok(Json(cached.into_iter().map(ReviewDto::from).collect()));
    }

    let repo = state.database.repository();
    let reviews = repo
        .list_reviews(product_id, page.limit, page.offset)
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(ApiError::product_not_found)?;

    state
        .reviews
        .set_reviews(product_id, page.limit, page.offset, &reviews)
        .await;

    Ok(Json(reviews.into_iter().map(ReviewDto::from).collect()))
}

/// Add a review to a product
#[utoipa::path(
    post,
    path = "/api/v1/products/{product_id}/reviews",
    tag = "reviews",
    request_body = ReviewRequest,
    params(
        ("product_id" = String, Path, description = "Product ID"),
        ("X-Idempotency-Key" = Option<String>, Header, description = "Replay token")
    ),
    responses(
        (status = 201, description = "Review created", body = ReviewDto),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn create_review(
    State(state): State<ReviewsApiState>,
    path: ProductPath,
    ValidatedJson(body): ValidatedJson<ReviewRequest>,
) -> Result<(StatusCode, Json<ReviewDto>), ApiError> {
    let repo = state.database.repository();

    let review = repo
        .create_review(path.product_id, &body.into())
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(ApiError::product_not_found)?;

    state.reviews.invalidate_product(review.product_id).await;
    state
        .events
        .publish(ReviewEvent::new(
            EventType::ReviewCreated,
            review.id,
            review.product_id,
            review.rating,
        ))
        .await;

    Ok((StatusCode::CREATED, Json(review.into())))
}

/// Replace a review's fields
#[utoipa::path(
    put,
    path = "/api/v1/products/{product_id}/reviews/{review_id}",
    tag = "reviews",
    request_body = ReviewRequest,
    params(
        ("product_id" = String, Path, description = "Product ID"),
        ("review_id" = String, Path, description = "Review ID"),
        ("X-Idempotency-Key" = Option<String>, Header, description = "Replay token")
    ),
    responses(
        (status = 200, description = "Review updated", body = ReviewDto),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn update_review(
    State(state): State<ReviewsApiState>,
    path: ReviewPath,
    ValidatedJson(body): ValidatedJson<ReviewRequest>,
) -> Result<Json<ReviewDto>, ApiError> {
    let repo = state.database.repository();

    let review = repo
        .update_review(path.product_id, path.review_id, &body.into())
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(ApiError::review_not_found)?;

    state.reviews.invalidate_product(review.product_id).await;
    state
        .events
        .publish(ReviewEvent::new(
            EventType::ReviewUpdated,
            review.id,
            review.product_id,
            review.rating,
        ))
        .await;

    Ok(Json(review.into()))
}

/// Delete a review
#[utoipa::path(
    delete,
    path = "/api/v1/products/{product_id}/reviews/{review_id}",
    tag = "reviews",
    params(
        ("product_id" = String, Path, description = "Product ID"),
        ("review_id" = String, Path, description = "Review ID"),
        ("X-Idempotency-Key" = Option<String>, Header, description = "Replay token")
    ),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 400, description = "Invalid product or review ID"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn delete_review(
    State(state): State<ReviewsApiState>,
    path: ReviewPath,
) -> Result<StatusCode, ApiError> {
    let repo = state.database.repository();

    let deleted = repo
        .delete_review(path.product_id, path.review_id)
        .await
        .map_err(ApiError::from_data)?;
    if !deleted {
        return Err(ApiError::review_not_found());
    }

    state.reviews.invalidate_product(path.product_id).await;
    state
        .events
        .publish(ReviewEvent::new(
            EventType::ReviewDeleted,
            path.review_id,
            path.product_id,
            0,
        ))
        .await;

    Ok(StatusCode::NO_CONTENT)
}
