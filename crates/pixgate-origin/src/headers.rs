//! User-Agent policy and upstream header shaping

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use tracing::debug;

/// Desktop Chrome on Windows
pub const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Mobile Safari on iOS
pub const MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

/// How the upstream User-Agent is chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UaPolicy {
    /// Always send the desktop UA
    Desktop,
    /// Always send the mobile UA
    Mobile,
    /// Pick desktop or mobile at random per request
    Rotate,
    /// Mobile if the client's own UA contains "Mobile", else desktop
    #[default]
    Auto,
}

impl UaPolicy {
    /// Resolve the policy from the request's query directives, falling back
    /// to auto-detection. `mobile=1` wins over `desktop=1` wins over
    /// `rotate=1`.
    pub fn from_directives(mobile: bool, desktop: bool, rotate: bool) -> Self {
        if mobile {
            UaPolicy::Mobile
        } else if desktop {
            UaPolicy::Desktop
        } else if rotate {
            UaPolicy::Rotate
        } else {
            UaPolicy::Auto
        }
    }
}

/// Pick the upstream User-Agent string.
///
/// `coin` decides `Rotate`; the caller supplies it so selection stays
/// deterministic under test.
pub fn select_user_agent(policy: UaPolicy, client_ua: Option<&str>, coin: bool) -> &'static str {
    let prefer_mobile = match policy {
        UaPolicy::Mobile => true,
        UaPolicy::Desktop => false,
        UaPolicy::Rotate => coin,
        UaPolicy::Auto => client_ua.is_some_and(|ua| ua.contains("Mobile")),
    };

    if prefer_mobile { MOBILE_UA } else { DESKTOP_UA }
}

/// Build the browser-realism header set for an upstream request.
///
/// The original client's UA is preserved under `X-Forwarded-User-Agent`.
pub fn build_upstream_headers(ua: &'static str, client_ua: Option<&str>, referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(USER_AGENT, HeaderValue::from_static(ua));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("image/avif,image/webp,image/apng,image/*,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    if let Ok(value) = HeaderValue::from_str(referer) {
        headers.insert(REFERER, value);
    }
    headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("cross-site"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("no-cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("image"),
    );
    headers.insert(
        HeaderName::from_static("upgrade-insecure-requests"),
        HeaderValue::from_static("1"),
    );

    if let Some(client_ua) = client_ua {
        match HeaderValue::from_str(client_ua) {
            Ok(value) => {
                headers.insert(HeaderName::from_static("x-forwarded-user-agent"), value);
            }
            Err(_) => debug!("Client User-Agent not forwardable as a header value"),
        }
    }

    headers
}
