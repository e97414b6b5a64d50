//! Response resolver: the request-handling decision policy
//!
//! Given a parsed request, the resolver consults the rate limiter, the
//! cache store, and the origin fetcher, and produces exactly one terminal
//! [`Resolution`] per request.

use bytes::Bytes;
use chrono::Utc;
use http::StatusCode;
use pixgate_origin::{FetchOutcome, OriginFetcher, UaSelection};
use pixgate_storage::cache_key;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, EntryMeta};
use crate::limiter::RateLimiter;

/// Warning header value for a stale body served on upstream transport failure.
pub const WARN_STALE: &str = "110 - \"Response is stale\"";

/// Warning header value for a cached body served after failed revalidation.
pub const WARN_REVALIDATION_FAILED: &str = "111 - \"Revalidation failed\"";

/// Cache-Control applied when the origin supplied none.
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=60";

/// Configuration for the resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Serve a cached body on upstream 4xx/5xx (other than 429)
    pub stale_if_error: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            stale_if_error: true,
        }
    }
}

/// One parsed inbound request.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Rate-limiting identity, typically a forwarded-for or peer address
    pub identity: String,
    /// Resource path beneath the upstream base URL
    pub path: String,
    /// User-Agent policy and the client's own UA
    pub ua: UaSelection,
}

/// The terminal response for one request.
#[derive(Debug)]
pub struct Resolution {
    pub status: StatusCode,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub warning: Option<&'static str>,
    pub retry_after: Option<String>,
}

impl Resolution {
    fn ok(body: Bytes, content_type: Option<String>, cache_control: Option<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            content_type,
            cache_control,
            warning: None,
            retry_after: None,
        }
    }

    fn stale(body: Bytes, entry: &EntryMeta, warning: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            content_type: entry.content_type.clone(),
            cache_control: None,
            warning: Some(warning),
            retry_after: None,
        }
    }

    fn error(status: StatusCode, message: &'static str) -> Self {
        Self {
            status,
            body: Bytes::from_static(message.as_bytes()),
            content_type: None,
            cache_control: None,
            warning: None,
            retry_after: None,
        }
    }

    fn relay(status: StatusCode, body: Bytes) -> Self {
        Self {
            status,
            body,
            content_type: None,
            cache_control: None,
            warning: None,
            retry_after: None,
        }
    }
}

/// Response resolver owning the process-lifetime shared state.
pub struct ProxyService {
    limiter: Arc<RateLimiter>,
    cache: Arc<CacheStore>,
    fetcher: Arc<dyn OriginFetcher>,
    config: ResolverConfig,
}

impl ProxyService {
    /// Create a new resolver
    pub fn new(
        limiter: Arc<RateLimiter>,
        cache: Arc<CacheStore>,
        fetcher: Arc<dyn OriginFetcher>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            limiter,
            cache,
            fetcher,
            config,
        }
    }

    /// Resolve one request to its terminal response.
    pub async fn resolve(&self, req: ProxyRequest) -> Resolution {
        metrics::counter!("pixgate_requests_total").increment(1);

        // Parent-directory traversal is rejected before any other work
        if req.path.contains("..") {
            return Resolution::error(StatusCode::BAD_REQUEST, "invalid path");
        }

        // Admission runs before any cache or network activity
        if !self.limiter.allow(&req.identity) {
            warn!("Rate limit hit for client {}", req.identity);
            metrics::counter!("pixgate_client_limited_total").increment(1);
            return Resolution::error(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests (client rate limit)",
            );
        }

        let key = cache_key(&req.path);
        let cached = self.cache.lookup(&key);

        // A fresh entry is served without contacting the origin at all
        if let Some(entry) = &cached
            && self.cache.is_fresh(entry, Utc::now())
            && let Some((body, entry)) = self.read_cached(&key).await
        {
            debug!("Serving fresh cache for {}", req.path);
            metrics::counter!("pixgate_cache_hits_total").increment(1);
            let cache_control = entry
                .cache_control
                .clone()
                .or_else(|| Some(DEFAULT_CACHE_CONTROL.to_string()));
            return Resolution::ok(body, entry.content_type.clone(), cache_control);
        }

        // Even a stale entry contributes its validators
        let revalidators = cached
            .as_ref()
            .map(|entry| entry.revalidators())
            .filter(|r| !r.is_empty());

        let mut outcome = self
            .fetcher
            .fetch(&req.path, revalidators, req.ua.clone())
            .await;

        if matches!(outcome, Ok(FetchOutcome::NotModified)) {
            if let Some((body, entry)) = self.read_cached(&key).await {
                info!("Upstream 304, serving cached {}", req.path);
                metrics::counter!("pixgate_revalidated_total").increment(1);
                self.cache.touch(&key, Utc::now());
                return Resolution::ok(body, entry.content_type.clone(), entry.cache_control.clone());
            }

            // 304 without a cache entry: retry once unconditionally
            warn!("Received 304 but no cache entry exists for {}", req.path);
            outcome = self.fetcher.fetch(&req.path, None, req.ua.clone()).await;
        }

        match outcome {
            Err(e) => {
                warn!("Upstream request error for {}: {}", req.path, e);
                metrics::counter!("pixgate_upstream_errors_total").increment(1);
                match self.read_cached(&key).await {
                    Some((body, entry)) => {
                        info!("Serving stale cache due to upstream error for {}", req.path);
                        metrics::counter!("pixgate_stale_served_total").increment(1);
                        Resolution::stale(body, &entry, WARN_STALE)
                    }
                    None => Resolution::error(StatusCode::BAD_GATEWAY, "Bad Gateway"),
                }
            }

            Ok(FetchOutcome::Throttled { retry_after }) => {
                warn!(
                    "Upstream 429 for {} (retry-after: {:?})",
                    req.path, retry_after
                );
                metrics::counter!("pixgate_upstream_throttled_total").increment(1);
                match self.read_cached(&key).await {
                    Some((body, entry)) => {
                        metrics::counter!("pixgate_stale_served_total").increment(1);
                        let mut resolution = Resolution::stale(body, &entry, WARN_REVALIDATION_FAILED);
                        resolution.retry_after = retry_after;
                        resolution
                    }
                    None => {
                        let mut resolution = Resolution::error(
                            StatusCode::TOO_MANY_REQUESTS,
                            "Too Many Requests",
                        );
                        resolution.retry_after = retry_after;
                        resolution
                    }
                }
            }

            Ok(FetchOutcome::Failed { status, body }) => {
                warn!("Upstream returned {} for {}", status, req.path);
                metrics::counter!("pixgate_upstream_errors_total").increment(1);
                if self.config.stale_if_error
                    && let Some((cached_body, entry)) = self.read_cached(&key).await
                {
                    metrics::counter!("pixgate_stale_served_total").increment(1);
                    return Resolution::stale(cached_body, &entry, WARN_REVALIDATION_FAILED);
                }
                Resolution::relay(status, body)
            }

            Ok(FetchOutcome::Success { body, meta }) => {
                let entry = EntryMeta::from_origin(meta, Utc::now());
                let content_type = entry.content_type.clone();
                let cache_control = entry
                    .cache_control
                    .clone()
                    .or_else(|| Some(DEFAULT_CACHE_CONTROL.to_string()));

                // A failed cache write degrades to serving uncached
                if let Err(e) = self.cache.insert(&key, entry, body.clone()).await {
                    warn!("Failed to write cache for {}: {}", req.path, e);
                }

                Resolution::ok(body, content_type, cache_control)
            }

            // Only reachable as a second consecutive 304 on an unconditional
            // fetch; there is no body to serve.
            Ok(FetchOutcome::NotModified) => {
                warn!("Unconditional fetch for {} answered 304", req.path);
                Resolution::error(StatusCode::BAD_GATEWAY, "Bad Gateway")
            }
        }
    }

    async fn read_cached(&self, key: &str) -> Option<(Bytes, EntryMeta)> {
        match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }
}
