//! OpenAPI specification and Swagger UI

use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{health, products, reviews};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ReviewHub API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Products and reviews with cached ratings and idempotent writes"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "products", description = "Product management"),
        (name = "reviews", description = "Product reviews")
    ),
    paths(
        // Health
        health::health,
        // Products
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::delete_product,
        // Reviews
        reviews::list_reviews,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
    ),
    components(schemas(
        health::HealthResponse,
        products::types::ProductDto,
        products::types::ProductRequest,
        reviews::types::ReviewDto,
        reviews::types::ReviewRequest,
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

/// Serve Swagger UI from CDN
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>ReviewHub API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: "/api/openapi.json",
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout",
                deepLinking: true,
                showExtensions: true,
                showCommonExtensions: true
            });
        };
    </script>
</body>
</html>"#;
