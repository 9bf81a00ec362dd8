//! Product API endpoints
//!
//! Ratings in responses prefer the cached value, including a cached "no
//! reviews". On a rating miss the database value is returned and cached.

pub mod types;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use types::{ProductDto, ProductRequest};

use crate::api::extractors::{Pagination, ProductPath, ValidatedJson};
use crate::api::types::ApiError;
use crate::data::TransactionalService;
use crate::data::cache::{RatingLookup, ReviewCache};
use crate::data::types::{DeleteProductOutcome, ProductRow};

/// Shared state for Products API endpoints
#[derive(Clone)]
pub struct ProductsApiState {
    pub database: Arc<TransactionalService>,
    pub reviews: ReviewCache,
}

/// Build Products API routes
pub fn routes(database: Arc<TransactionalService>, reviews: ReviewCache) -> Router<()> {
    let state = ProductsApiState { database, reviews };

    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{product_id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .with_state(state)
}

/// Swap in the cached rating, or seed the cache with the database one
async fn resolve_rating(reviews: &ReviewCache, product: &mut ProductRow) {
    match reviews.get_rating(product.id).await {
        RatingLookup::Cached(rating) => product.average_rating = rating,
        RatingLookup::Miss => reviews.set_rating(product.id, product.average_rating).await,
    }
}

/// List products, newest first
#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "products",
    params(
        ("limit" = Option<i64>, Query, description = "Items per page (1-100, default 10)"),
        ("offset" = Option<i64>, Query, description = "Items to skip (default 0)")
    ),
    responses(
        (status = 200, description = "Page of products", body = Vec<ProductDto>),
        (status = 400, description = "Invalid query")
    )
)]
pub async fn list_products(
    State(state): State<ProductsApiState>,
    page: Pagination,
) -> Result<Json<Vec<ProductDto>>, ApiError> {
    let repo = state.database.repository();

    let mut products = repo
        .list_products(page.limit, page.offset)
        .await
        .map_err(ApiError::from_data)?;

    for product in &mut products {
        resolve_rating(&state.reviews, product).await;
    }

    Ok(Json(products.into_iter().map(ProductDto::from).collect()))
}

/// Create a product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    tag = "products",
    request_body = ProductRequest,
    params(
        ("X-Idempotency-Key" = Option<String>, Header, description = "Replay token")
    ),
    responses(
        (status = 201, description = "Product created", body = ProductDto),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn create_product(
    State(state): State<ProductsApiState>,
    ValidatedJson(body): ValidatedJson<ProductRequest>,
) -> Result<(StatusCode, Json<ProductDto>), ApiError> {
    let repo = state.database.repository();

    let product = repo
        .create_product(&body.into())
        .await
        .map_err(ApiError::from_data)?;

    tracing::debug!(product_id = product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// Get a product with its average rating
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}",
    tag = "products",
    params(("product_id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ProductDto),
        (status = 400, description = "Invalid product ID"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn get_product(
    State(state): State<ProductsApiState>,
    path: ProductPath,
) -> Result<Json<ProductDto>, ApiError> {
    let repo = state.database.repository();

    let mut product = repo
        .get_product(path.product_id)
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(ApiError::product_not_found)?;

    resolve_rating(&state.reviews, &mut product).await;

    Ok(Json(product.into()))
}

/// Replace a product's fields
#[utoipa::path(
    put,
    path = "/api/v1/products/{product_id}",
    tag = "products",
    request_body = ProductRequest,
    params(
        ("product_id" = String, Path, description = "Product ID"),
        ("X-Idempotency-Key" = Option<String>, Header, description = "Replay token")
    ),
    responses(
        (status = 200, description = "Product updated", body = ProductDto),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn update_product(
    State(state): State<ProductsApiState>,
    path: ProductPath,
    ValidatedJson(body): ValidatedJson<ProductRequest>,
) -> Result<Json<ProductDto>, ApiError> {
    let repo = state.database.repository();

    let product = repo
        .update_product(path.product_id, &body.into())
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(ApiError::product_not_found)?;

    Ok(Json(product.into()))
}

/// Delete a product that has no reviews
#[utoipa::path(
    delete,
    path = "/api/v1/products/{product_id}",
    tag = "products",
    params(
        ("product_id" = String, Path, description = "Product ID"),
        ("X-Idempotency-Key" = Option<String>, Header, description = "Replay token")
    ),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, description = "Invalid product ID"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product still has reviews")
    )
)]
pub async fn delete_product(
    State(state): State<ProductsApiState>,
    path: ProductPath,
) -> Result<StatusCode, ApiError> {
    let repo = state.database.repository();

    match repo
        .delete_product(path.product_id)
        .await
        .map_err(ApiError::from_data)?
    {
        DeleteProductOutcome::Deleted => {
            // Drop any cached empty pages or null rating left for the product
            state.reviews.invalidate_product(path.product_id).await;
            Ok(StatusCode::NO_CONTENT)
        }
        DeleteProductOutcome::NotFound => Err(ApiError::product_not_found()),
        DeleteProductOutcome::HasReviews => Err(ApiError::conflict(
            "PRODUCT_HAS_REVIEWS",
            "Cannot delete product with existing reviews",
        )),
    }
}
