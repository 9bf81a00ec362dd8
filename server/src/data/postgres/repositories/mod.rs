//! PostgreSQL repositories
//!
//! Mirrors the SQLite repositories with PostgreSQL placeholders and casts.

pub mod product;
pub mod review;
