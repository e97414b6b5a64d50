//! Pixgate HTTP API
//!
//! This crate provides the Axum-based HTTP surface for the proxy:
//! the forwarding route, health checks, and the metrics endpoint.

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
