//! HTTP middleware (CORS, 404 handler)

use axum::Json;
use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::core::config::is_all_interfaces;
use crate::core::constants::IDEMPOTENCY_HEADER;

/// Allowed origins configuration
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    /// Create allowed origins from host and port configuration
    pub fn new(host: &str, port: u16) -> Self {
        let mut origins = Vec::new();
        let is_all = is_all_interfaces(host);

        // Binding to all interfaces or loopback allows both loopback spellings
        let base_hosts: Vec<&str> = if is_all || host == "127.0.0.1" || host == "localhost" {
            vec!["localhost", "127.0.0.1"]
        } else {
            vec![host]
        };

        for h in &base_hosts {
            origins.push(format!("http://{}:{}", h, port));
            origins.push(format!("http://{}", h));
        }

        // Allow LAN IPs when binding to all interfaces
        if is_all && let Ok(interfaces) = local_ip_address::list_afinet_netifas() {
            for (_, ip) in interfaces
                .iter()
                .filter(|(_, ip)| ip.is_ipv4() && !ip.is_loopback())
            {
                origins.push(format!("http://{}:{}", ip, port));
            }
        }

        Self { origins }
    }

    /// Check if an origin is allowed
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    /// Get origins as HeaderValues for CORS
    fn as_header_values(&self) -> Vec<HeaderValue> {
        self.origins.iter().filter_map(|o| o.parse().ok()).collect()
    }
}

/// Create CORS layer
pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.as_header_values()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            header::CACHE_CONTROL,
            HeaderName::from_static(IDEMPOTENCY_HEADER),
        ])
}

const MAX_404_BODY_LOG: usize = 64 * 1024; // 64KB limit for logging

fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "not_found",
            "code": "ROUTE_NOT_FOUND",
            "message": "Route not found"
        })),
    )
}

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return not_found();
    }

    let method = req.method().clone();
    let uri = req.uri().clone();

    let body_bytes = match to_bytes(req.into_body(), MAX_404_BODY_LOG).await {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::debug!("[404] {} {} (failed to read body)", method, uri);
            return not_found();
        }
    };

    let body_value = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or_else(|_| {
            serde_json::Value::String(format!("<{} bytes>", body_bytes.len()))
        })
    };

    tracing::debug!(
        method = %method,
        url = %uri,
        body = %body_value,
        "[404] No route matched"
    );

    not_found()
}
