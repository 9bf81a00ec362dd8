//! Product API types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::data::types::{ProductInput, ProductRow};

/// Product DTO for API responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductDto {
    /// Decimal id
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    /// Mean review rating, omitted when the product has no reviews
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
}

impl From<ProductRow> for ProductDto {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id.to_string(),
            name: row.name,
            description: row.description,
            price: row.price,
            average_rating: row.average_rating,
        }
    }
}

/// Request body for creating or replacing a product
///
/// Missing fields take their zero value and are then rejected by validation,
/// so an absent name reads "name is required" rather than a parse error.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProductRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    #[validate(range(exclusive_min = 0.0, message = "price must be greater than 0"))]
    pub price: f64,
}

impl From<ProductRequest> for ProductInput {
    fn from(req: ProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
        }
    }
}
