//! Product and review row types

use serde::{Deserialize, Serialize};

// ============================================================================
// Product types
// ============================================================================

/// Product row from database, joined with its average rating
///
/// `average_rating` is `AVG(rating)` over the product's reviews and is `None`
/// when it has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub average_rating: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields accepted when creating or replacing a product
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: f64,
}

/// Result of a product delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteProductOutcome {
    Deleted,
    NotFound,
    /// Product still has reviews and was left in place
    HasReviews,
}

// ============================================================================
// Review types
// ============================================================================

/// Review row from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRow {
    pub id: i64,
    pub product_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields accepted when creating or replacing a review
#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub first_name: String,
    pub last_name: String,
    pub rating: i32,
    pub comment: Option<String>,
}
