//! SQLite repositories
//!
//! Types (ProductRow, ReviewRow, etc.) should be imported from `crate::data::types`.
//! Every operation runs in its own transaction so existence checks and writes
//! see the same snapshot.

pub mod product;
pub mod review;

