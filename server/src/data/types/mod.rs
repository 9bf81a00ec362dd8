//! Shared data types for all database backends
//!
//! Row types here are produced by both SQLite and PostgreSQL repositories and
//! are what the review cache serializes.

mod catalog;

pub use catalog::{DeleteProductOutcome, ProductInput, ProductRow, ReviewInput, ReviewRow};
