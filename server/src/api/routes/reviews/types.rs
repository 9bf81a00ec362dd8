//! Review API types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::data::types::{ReviewInput, ReviewRow};

/// Review DTO for API responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewDto {
    pub id: String,
    pub product_id: String,
    pub rating: i32,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl From<ReviewRow> for ReviewDto {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id.to_string(),
            product_id: row.product_id.to_string(),
            rating: row.rating,
            first_name: row.first_name,
            last_name: row.last_name,
            comment: row.comment,
        }
    }
}

/// Request body for creating or replacing a review
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReviewRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,

    /// 1 to 5; a missing rating is rejected
    #[serde(default)]
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i32,

    pub comment: Option<String>,
}

impl From<ReviewRequest> for ReviewInput {
    fn from(req: ReviewRequest) -> Self {
        Self {
            first_name: req.first_name.unwrap_or_default(),
            last_name: req.last_name.unwrap_or_default(),
            rating: req.rating,
            comment: req.comment,
        }
    }
}
