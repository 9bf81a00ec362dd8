//! ReviewHub server: products and reviews over HTTP with a cache-aside
//! review layer, idempotent mutations and review change events.

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod utils;
