//! HTTP server exposing a string cache.
//!
//! - [`api`]: Request/response types and route handlers
//! - [`streaming`]: SSE streaming of live cache events

pub mod api;
pub mod streaming;

pub use api::{build_router, AppState};
