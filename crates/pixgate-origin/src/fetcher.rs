//! Origin fetcher trait and outcome types

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;

use crate::error::FetchError;
use crate::headers::UaPolicy;

/// Revalidation metadata carried by a cache entry, used to build a
/// conditional GET.
#[derive(Debug, Clone, Default)]
pub struct Revalidators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Revalidators {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// User-Agent selection input for one request: the policy requested by the
/// client plus the client's own User-Agent (for auto-detection and for
/// forwarding under `X-Forwarded-User-Agent`).
#[derive(Debug, Clone, Default)]
pub struct UaSelection {
    pub policy: UaPolicy,
    pub client_user_agent: Option<String>,
}

/// Response metadata captured from a successful origin fetch.
#[derive(Debug, Clone, Default)]
pub struct OriginMetadata {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

/// Outcome of one fetch attempt against the origin.
///
/// Transport-level failures (DNS, connect, timeout, truncated body) are the
/// `Err` side of the fetch; everything that produced an HTTP status lands
/// here.
#[derive(Debug)]
pub enum FetchOutcome {
    /// 200 with a full body
    Success { body: Bytes, meta: OriginMetadata },
    /// 304, the cached body is still valid
    NotModified,
    /// 429 from the origin, with its Retry-After if supplied
    Throttled { retry_after: Option<String> },
    /// Any other >= 400 status, relayed verbatim when no fallback applies
    Failed { status: StatusCode, body: Bytes },
}

/// One outbound request to the origin. No internal retries; retry and
/// fallback policy belong to the resolver.
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    async fn fetch(
        &self,
        path: &str,
        revalidators: Option<Revalidators>,
        ua: UaSelection,
    ) -> Result<FetchOutcome, FetchError>;
}
