//! Idempotent replay of mutating requests
//!
//! A POST, PUT or DELETE carrying `X-Idempotency-Key` is answered from the
//! stored response when the token was seen within the TTL. Otherwise the
//! handler runs and its response is stored when the status is 2xx. The token
//! is the raw header value, not scoped by method or path.
//!
//! The whole response body is buffered before the client sees any of it.
//! That suits the handlers behind this layer, which all return complete
//! `Json` bodies; a streaming response would lose its streaming here.
//!
//! Store failures fail open: a lookup error is a miss and a write-back error
//! only loses the record. Two concurrent requests with the same unseen token
//! both execute.

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::types::ApiError;
use crate::core::constants::IDEMPOTENCY_HEADER;
use crate::data::idempotency::{IdempotencyStore, StoredResponse};

/// State for the idempotency middleware
#[derive(Clone)]
pub struct IdempotencyState {
    pub store: IdempotencyStore,
}

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE)
}

/// Client token, if present and non-empty, in any byte encoding
fn token(headers: &HeaderMap) -> Option<HeaderValue> {
    headers
        .get(IDEMPOTENCY_HEADER)
        .filter(|v| !v.is_empty())
        .cloned()
}

/// Idempotency middleware
pub async fn idempotency_middleware(
    State(state): State<IdempotencyState>,
    request: Request,
    next: Next,
) -> Response {
    if !is_mutating(request.method()) {
        return next.run(request).await;
    }
    let Some(token) = token(request.headers()) else {
        return next.run(request).await;
    };

    match state.store.lookup(token.as_bytes()).await {
        Ok(Some(stored)) => match replay(stored) {
            Some(response) => {
                tracing::debug!(?token, "Replaying stored response");
                return response;
            }
            None => tracing::warn!(?token, "Stored response is malformed, re-executing"),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!(?token, error = %e, "Idempotency lookup failed, proceeding"),
    }

    // Detached so a client disconnect cannot cancel a mutation mid-capture
    let task = tokio::spawn(execute_and_store(state.store, token, request, next));
    match task.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Request task failed");
            ApiError::internal("Request processing failed").into_response()
        }
    }
}

async fn execute_and_store(
    store: IdempotencyStore,
    token: HeaderValue,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let (parts, body) = response.into_parts();

    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(?token, error = %e, "Failed to buffer response body");
            return ApiError::internal("Failed to read response").into_response();
        }
    };

    if parts.status.is_success() {
        let stored = StoredResponse {
            status: parts.status.as_u16(),
            headers: parts
                .headers
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
                .collect(),
            body: bytes.to_vec(),
        };
        if let Err(e) = store.save(token.as_bytes(), &stored).await {
            tracing::warn!(?token, error = %e, "Failed to store idempotent response");
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Rebuild a stored response, or `None` if its status is unusable
fn replay(stored: StoredResponse) -> Option<Response> {
    let status = StatusCode::from_u16(stored.status).ok()?;

    let mut response = Response::new(Body::from(stored.body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in stored.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(header = %name, "Skipping invalid stored header"),
        }
    }
    Some(response)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::Router;
    use axum::routing::post;
    use tower::ServiceExt;

    use super::*;
    use crate::core::config::{CacheBackendType, CacheConfig};
    use crate::data::cache::CacheService;
    use crate::data::cache::testing::FailingCache;

    async fn memory_store() -> IdempotencyStore {
        let config = CacheConfig {
            backend: CacheBackendType::Memory,
            max_entries: 100,
            redis_url: None,
        };
        let cache = Arc::new(CacheService::new(&config).await.unwrap());
        IdempotencyStore::new(cache, Duration::from_secs(60))
    }

    /// Router whose handler counts calls and answers with `status`
    fn counting_app(store: IdempotencyStore, status: StatusCode) -> (Router, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let app = Router::new()
            .route(
                "/things",
                post(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        (status, [("x-call", n.to_string())], format!("call {}", n))
                    }
                })
                .get(|| async { "read" }),
            )
            .layer(axum::middleware::from_fn_with_state(
                IdempotencyState { store },
                idempotency_middleware,
            ));
        (app, calls)
    }

    fn post_with(token: Option<&str>) -> Request {
        let mut builder = Request::builder().method(Method::POST).uri("/things");
        if let Some(token) = token {
            builder = builder.header(IDEMPOTENCY_HEADER, token);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_with_raw(token: &[u8]) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri("/things")
            .header(IDEMPOTENCY_HEADER, HeaderValue::from_bytes(token).unwrap())
            .body(Body::empty())
            .unwrap()
    }

    async fn body_of(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_replays_stored_response() {
        let (app, calls) = counting_app(memory_store().await, StatusCode::CREATED);

        let first = app.clone().oneshot(post_with(Some("abc-1"))).await.unwrap();
        let second = app.clone().oneshot(post_with(Some("abc-1"))).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(second.status(), StatusCode::CREATED);
        assert_eq!(second.headers().get("x-call").unwrap(), "1");
        assert_eq!(body_of(first).await, body_of(second).await);
    }

    #[tokio::test]
    async fn test_replays_non_utf8_token() {
        let store = memory_store().await;
        let (app, calls) = counting_app(store.clone(), StatusCode::CREATED);

        app.clone().oneshot(post_with_raw(b"caf\xe9-1")).await.unwrap();
        let second = app.clone().oneshot(post_with_raw(b"caf\xe9-1")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.headers().get("x-call").unwrap(), "1");
        assert!(store.lookup(b"caf\xe9-1").await.unwrap().is_some());

        // A different byte sequence is a different token
        app.clone().oneshot(post_with_raw("café-1".as_bytes())).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_tokens_execute_separately() {
        let (app, calls) = counting_app(memory_store().await, StatusCode::CREATED);

        app.clone().oneshot(post_with(Some("a"))).await.unwrap();
        let second = app.clone().oneshot(post_with(Some("b"))).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(body_of(second).await, b"call 2");
    }

    #[tokio::test]
    async fn test_without_token_always_executes() {
        let (app, calls) = counting_app(memory_store().await, StatusCode::CREATED);

        app.clone().oneshot(post_with(None)).await.unwrap();
        app.clone().oneshot(post_with(None)).await.unwrap();
        app.clone().oneshot(post_with(Some(""))).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_success_is_not_stored() {
        let store = memory_store().await;
        let (app, calls) = counting_app(store.clone(), StatusCode::BAD_REQUEST);

        let first = app.clone().oneshot(post_with(Some("bad"))).await.unwrap();
        assert_eq!(first.status(), StatusCode::BAD_REQUEST);
        app.clone().oneshot(post_with(Some("bad"))).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.lookup(b"bad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reads_pass_through() {
        let store = memory_store().await;
        let (app, _) = counting_app(store.clone(), StatusCode::CREATED);

        let request = Request::builder()
            .uri("/things")
            .header(IDEMPOTENCY_HEADER, "read-1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(body_of(response).await, b"read");
        assert_eq!(store.lookup(b"read-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failing_store_fails_open() {
        let cache = Arc::new(CacheService::from_backend(Arc::new(FailingCache)));
        let store = IdempotencyStore::new(cache, Duration::from_secs(60));
        let (app, calls) = counting_app(store, StatusCode::CREATED);

        let first = app.clone().oneshot(post_with(Some("abc-1"))).await.unwrap();
        let second = app.clone().oneshot(post_with(Some("abc-1"))).await.unwrap();

        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(second.status(), StatusCode::CREATED);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unusable_stored_status_re_executes() {
        let store = memory_store().await;
        store
            .save(
                b"broken",
                &StoredResponse {
                    status: 42,
                    headers: vec![],
                    body: vec![],
                },
            )
            .await
            .unwrap();
        let (app, calls) = counting_app(store, StatusCode::CREATED);

        let response = app.oneshot(post_with(Some("broken"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
