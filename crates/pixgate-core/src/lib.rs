//! Pixgate Core Business Logic
//!
//! This crate provides the request-handling pipeline for the proxy:
//! per-client admission control, the response cache with freshness and
//! conditional-revalidation semantics, and the stale-serving fallback
//! policy under upstream failure.

pub mod cache;
pub mod error;
pub mod limiter;
pub mod resolver;

pub use cache::{CacheConfig, CacheStore, EntryMeta};
pub use error::CoreError;
pub use limiter::{RateLimiter, RateLimiterConfig};
pub use resolver::{ProxyRequest, ProxyService, Resolution, ResolverConfig};
