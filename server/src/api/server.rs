//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::idempotency::{IdempotencyState, idempotency_middleware};
use super::middleware::{self, AllowedOrigins};
use super::openapi::{openapi_json, swagger_ui_html};
use super::routes::{health, products, reviews};
use crate::core::CoreApp;
use crate::core::constants::DEFAULT_BODY_LIMIT;
use crate::data::TransactionalService;
use crate::data::cache::{CacheService, ReviewCache};
use crate::data::events::EventService;
use crate::data::idempotency::IdempotencyStore;

/// Everything the HTTP layer depends on
#[derive(Clone)]
pub struct ApiServices {
    pub database: Arc<TransactionalService>,
    pub reviews: ReviewCache,
    pub idempotency: IdempotencyStore,
    pub events: EventService,
}

impl ApiServices {
    /// Wire the review cache and idempotency store onto one cache backend
    pub fn new(
        database: Arc<TransactionalService>,
        cache: Arc<CacheService>,
        events: EventService,
        cache_ttl: Duration,
        idempotency_ttl: Duration,
    ) -> Self {
        Self {
            database,
            reviews: ReviewCache::new(Arc::clone(&cache), cache_ttl),
            idempotency: IdempotencyStore::new(cache, idempotency_ttl),
            events,
        }
    }
}

/// Build the full application router
///
/// Idempotency wraps only the product and review routes; compression sits
/// outside it so stored bodies are never compressed.
pub fn router(services: ApiServices, allowed_origins: &AllowedOrigins) -> Router {
    let catalog_routes = products::routes(services.database.clone(), services.reviews.clone())
        .merge(reviews::routes(
            services.database.clone(),
            services.reviews,
            services.events,
        ))
        .layer(axum::middleware::from_fn_with_state(
            IdempotencyState {
                store: services.idempotency,
            },
            idempotency_middleware,
        ));

    Router::new()
        .route("/api/openapi.json", get(openapi_json))
        .route("/api/docs", get(swagger_ui_html))
        .route("/api/docs/", get(swagger_ui_html))
        .nest("/api/v1/health", health::routes(services.database))
        .nest("/api/v1/products", catalog_routes)
        .fallback(middleware::handle_404)
        .layer(CompressionLayer::new())
        .layer(middleware::cors(allowed_origins))
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);
        Self {
            app,
            allowed_origins,
        }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self {
            app,
            allowed_origins,
        } = self;

        let shutdown = app.shutdown.clone();

        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(host.parse()?, port);

        let services = ApiServices::new(
            app.database.clone(),
            app.cache.clone(),
            app.events.clone(),
            Duration::from_secs(app.config.cache.ttl_secs),
            Duration::from_secs(app.config.idempotency.ttl_secs),
        );
        let router = router(services, &allowed_origins);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "Listening");
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::core::config::{CacheBackendType, CacheConfig};
    use crate::core::constants::IDEMPOTENCY_HEADER;
    use crate::data::SqliteService;
    use crate::data::cache::testing::FailingCache;
    use crate::data::events::EventType;

    struct TestApp {
        router: Router,
        services: ApiServices,
    }

    async fn test_app_with_cache(cache: Arc<CacheService>) -> TestApp {
        let sqlite = SqliteService::in_memory().await.unwrap();
        let database = Arc::new(TransactionalService::Sqlite(Arc::new(sqlite)));
        let services = ApiServices::new(
            database,
            cache,
            EventService::memory(),
            Duration::from_secs(300),
            Duration::from_secs(60),
        );
        let router = router(services.clone(), &AllowedOrigins::new("127.0.0.1", 8080));
        TestApp { router, services }
    }

    async fn test_app() -> TestApp {
        let config = CacheConfig {
            backend: CacheBackendType::Memory,
            max_entries: 1000,
            redis_url: None,
        };
        test_app_with_cache(Arc::new(CacheService::new(&config).await.unwrap())).await
    }

    impl TestApp {
        async fn send_raw(
            &self,
            method: Method,
            uri: &str,
            body: Option<Value>,
            token: Option<&str>,
        ) -> (StatusCode, Vec<u8>) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(IDEMPOTENCY_HEADER, token);
            }
            let body = match body {
                Some(value) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(value.to_string())
                }
                None => Body::empty(),
            };

            let response = self
                .router
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, bytes.to_vec())
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            body: Option<Value>,
            token: Option<&str>,
        ) -> (StatusCode, Value) {
            let (status, bytes) = self.send_raw(method, uri, body, token).await;
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Method::GET, uri, None, None).await
        }

        async fn create_product(&self, name: &str) -> String {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/api/v1/products",
                    Some(json!({ "name": name, "description": "test", "price": 9.5 })),
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body["id"].as_str().unwrap().to_string()
        }

        async fn create_review(&self, product_id: &str, rating: i32) -> Value {
            let (status, body) = self
                .send(
                    Method::POST,
                    &format!("/api/v1/products/{}/reviews", product_id),
                    Some(json!({ "first_name": "Ada", "last_name": "L", "rating": rating })),
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let (status, body) = app.get("/api/v1/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "healthy");
    }

    #[tokio::test]
    async fn test_product_crud() {
        let app = test_app().await;
        let id = app.create_product("Kettle").await;

        let (status, body) = app.get(&format!("/api/v1/products/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Kettle");
        assert_eq!(body["price"], 9.5);
        assert!(body.get("average_rating").is_none());

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/v1/products/{}", id),
                Some(json!({ "name": "Teapot", "price": 12.0 })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Teapot");
        assert_eq!(body["description"], "");

        let (status, body) = app.get("/api/v1/products").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = app
            .send(Method::DELETE, &format!("/api/v1/products/{}", id), None, None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = app.get(&format!("/api/v1/products/{}", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Product not found");
    }

    #[tokio::test]
    async fn test_product_validation_errors() {
        let app = test_app().await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/products",
                Some(json!({ "name": "", "price": 1.0 })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "name is required");

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/products",
                Some(json!({ "name": "Free", "price": 0 })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "price must be greater than 0");

        let (status, body) = app
            .send(Method::POST, "/api/v1/products", Some(json!("nope")), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid request body");

        let (status, body) = app.get("/api/v1/products/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid product ID");
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_review_validation_and_missing_product() {
        let app = test_app().await;
        let id = app.create_product("Kettle").await;

        let (status, body) = app
            .send(
                Method::POST,
                &format!("/api/v1/products/{}/reviews", id),
                Some(json!({ "rating": 6 })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "rating must be between 1 and 5");

        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/products/999/reviews",
                Some(json!({ "rating": 3 })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.get("/api/v1/products/999/reviews").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .send(
                Method::DELETE,
                &format!("/api/v1/products/{}/reviews/x", id),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid review ID");
    }

    #[tokio::test]
    async fn test_review_create_invalidates_cached_pages() {
        let app = test_app().await;
        let id = app.create_product("Kettle").await;
        let pid: i64 = id.parse().unwrap();
        app.create_review(&id, 4).await;

        let (status, body) = app.get(&format!("/api/v1/products/{}/reviews", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert!(app.services.reviews.get_reviews(pid, 10, 0).await.is_some());

        app.create_review(&id, 2).await;
        assert!(app.services.reviews.get_reviews(pid, 10, 0).await.is_none());

        let (_, body) = app.get(&format!("/api/v1/products/{}/reviews", id)).await;
        let reviews = body.as_array().unwrap();
        assert_eq!(reviews.len(), 2);
        // Newest first
        assert_eq!(reviews[0]["rating"], 2);
        assert_eq!(reviews[0]["first_name"], "Ada");
    }

    #[tokio::test]
    async fn test_review_list_served_from_cache() {
        let app = test_app().await;
        let id = app.create_product("Kettle").await;
        let pid: i64 = id.parse().unwrap();

        let (_, body) = app.get(&format!("/api/v1/products/{}/reviews", id)).await;
        assert_eq!(body, json!([]));

        // A page written straight to the cache is what the next read returns
        let cached = crate::data::types::ReviewRow {
            id: 77,
            product_id: pid,
            first_name: "Cached".to_string(),
            last_name: String::new(),
            rating: 5,
            comment: None,
            created_at: 0,
            updated_at: 0,
        };
        app.services.reviews.set_reviews(pid, 10, 0, &[cached]).await;

        let (_, body) = app.get(&format!("/api/v1/products/{}/reviews", id)).await;
        assert_eq!(body[0]["id"], "77");
        assert_eq!(body[0]["first_name"], "Cached");
    }

    #[tokio::test]
    async fn test_review_pagination_is_clamped() {
        let app = test_app().await;
        let id = app.create_product("Kettle").await;
        for rating in [1, 2, 3] {
            app.create_review(&id, rating).await;
        }

        let (_, body) = app
            .get(&format!("/api/v1/products/{}/reviews?limit=0", id))
            .await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = app
            .get(&format!("/api/v1/products/{}/reviews?limit=500&offset=-4", id))
            .await;
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (_, body) = app
            .get(&format!("/api/v1/products/{}/reviews?limit=2&offset=2", id))
            .await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = app
            .get(&format!("/api/v1/products/{}/reviews?limit=ten", id))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_product_rating_prefers_cache() {
        let app = test_app().await;
        let id = app.create_product("Kettle").await;
        let pid: i64 = id.parse().unwrap();
        app.create_review(&id, 4).await;
        app.create_review(&id, 5).await;

        let (_, body) = app.get(&format!("/api/v1/products/{}", id)).await;
        assert_eq!(body["average_rating"], 4.5);
        assert_eq!(
            app.services.reviews.get_rating(pid).await,
            crate::data::cache::RatingLookup::Cached(Some(4.5))
        );

        // An explicit cached null wins over the database value
        app.services.reviews.set_rating(pid, None).await;
        let (_, body) = app.get(&format!("/api/v1/products/{}", id)).await;
        assert!(body.get("average_rating").is_none());

        let (_, body) = app.get("/api/v1/products").await;
        assert!(body[0].get("average_rating").is_none());
    }

    #[tokio::test]
    async fn test_review_mutation_drops_cached_rating() {
        let app = test_app().await;
        let id = app.create_product("Kettle").await;
        let review = app.create_review(&id, 2).await;
        let review_id = review["id"].as_str().unwrap();

        let (_, body) = app.get(&format!("/api/v1/products/{}", id)).await;
        assert_eq!(body["average_rating"], 2.0);

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/v1/products/{}/reviews/{}", id, review_id),
                Some(json!({ "rating": 5, "comment": "better now" })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["comment"], "better now");
        assert_eq!(body["first_name"], "");

        let (_, body) = app.get(&format!("/api/v1/products/{}", id)).await;
        assert_eq!(body["average_rating"], 5.0);
    }

    #[tokio::test]
    async fn test_delete_product_with_reviews_conflicts() {
        let app = test_app().await;
        let id = app.create_product("Kettle").await;
        let review = app.create_review(&id, 3).await;
        let review_id = review["id"].as_str().unwrap();

        let (status, body) = app
            .send(Method::DELETE, &format!("/api/v1/products/{}", id), None, None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Cannot delete product with existing reviews");

        let (status, _) = app
            .send(
                Method::DELETE,
                &format!("/api/v1/products/{}/reviews/{}", id, review_id),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app
            .send(
                Method::DELETE,
                &format!("/api/v1/products/{}/reviews/{}", id, review_id),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .send(Method::DELETE, &format!("/api/v1/products/{}", id), None, None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_review_update_is_scoped_to_product() {
        let app = test_app().await;
        let first = app.create_product("Kettle").await;
        let second = app.create_product("Teapot").await;
        let review = app.create_review(&first, 3).await;
        let review_id = review["id"].as_str().unwrap();

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/v1/products/{}/reviews/{}", second, review_id),
                Some(json!({ "rating": 1 })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Review not found");
    }

    #[tokio::test]
    async fn test_repeated_token_replays_review_create() {
        let app = test_app().await;
        let id = app.create_product("Kettle").await;
        let uri = format!("/api/v1/products/{}/reviews", id);
        let body = json!({ "first_name": "Ada", "rating": 5, "comment": "great" });

        let (first_status, first) = app
            .send_raw(Method::POST, &uri, Some(body.clone()), Some("abc-1"))
            .await;
        let (second_status, second) = app
            .send_raw(Method::POST, &uri, Some(body), Some("abc-1"))
            .await;

        assert_eq!(first_status, StatusCode::CREATED);
        assert_eq!(second_status, StatusCode::CREATED);
        assert_eq!(first, second);

        let (_, reviews) = app.get(&uri).await;
        assert_eq!(reviews.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_request_is_not_replayed() {
        let app = test_app().await;

        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/products",
                Some(json!({ "name": "", "price": 1.0 })),
                Some("retry-me"),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/products",
                Some(json!({ "name": "Fixed", "price": 1.0 })),
                Some("retry-me"),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_events_published_after_commit() {
        let app = test_app().await;
        let mut rx = app.services.events.subscribe().unwrap();
        let id = app.create_product("Kettle").await;

        let review = app.create_review(&id, 4).await;
        let review_id = review["id"].as_str().unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type, EventType::ReviewCreated);
        assert_eq!(event.data.product_id, id);
        assert_eq!(event.data.review_id, review_id);
        assert_eq!(event.data.rating, 4);

        app.send(
            Method::DELETE,
            &format!("/api/v1/products/{}/reviews/{}", id, review_id),
            None,
            None,
        )
        .await;
        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type, EventType::ReviewDeleted);
        assert_eq!(event.data.rating, 0);

        // Rejected mutations publish nothing
        app.send(
            Method::POST,
            &format!("/api/v1/products/{}/reviews", id),
            Some(json!({ "rating": 0 })),
            None,
        )
        .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_cache_degrades_to_database() {
        let app = test_app_with_cache(Arc::new(CacheService::from_backend(Arc::new(FailingCache))))
            .await;
        let id = app.create_product("Kettle").await;
        let uri = format!("/api/v1/products/{}/reviews", id);

        for _ in 0..2 {
            let (status, _) = app
                .send(Method::POST, &uri, Some(json!({ "rating": 3 })), Some("abc-1"))
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        // Without a store the token cannot be remembered
        let (status, body) = app.get(&uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (_, body) = app.get(&format!("/api/v1/products/{}", id)).await;
        assert_eq!(body["average_rating"], 3.0);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let app = test_app().await;
        let (status, body) = app.get("/api/v1/nothing-here").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_openapi_served() {
        let app = test_app().await;
        let (status, body) = app.get("/api/openapi.json").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "ReviewHub API");
    }
}
