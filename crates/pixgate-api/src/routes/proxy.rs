//! Forwarding proxy route

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::Response,
    routing::get,
};
use pixgate_core::{ProxyRequest, Resolution};
use pixgate_origin::{UaPolicy, UaSelection};
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::debug;

use crate::state::AppState;

/// Query directives selecting the upstream User-Agent policy
#[derive(Deserialize, Default)]
pub struct UaQuery {
    mobile: Option<String>,
    desktop: Option<String>,
    rotate: Option<String>,
}

impl UaQuery {
    fn policy(&self) -> UaPolicy {
        UaPolicy::from_directives(
            self.mobile.as_deref() == Some("1"),
            self.desktop.as_deref() == Some("1"),
            self.rotate.as_deref() == Some("1"),
        )
    }
}

/// The identity used to key rate limiting: the forwarded-for string when
/// present, else the socket peer address.
fn client_identity(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Render a terminal resolution as an HTTP response.
fn into_response(resolution: Resolution) -> Response {
    let mut response = Response::new(Body::from(resolution.body));
    *response.status_mut() = resolution.status;

    let headers = response.headers_mut();
    if let Some(content_type) = resolution.content_type
        && let Ok(value) = HeaderValue::from_str(&content_type)
    {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(cache_control) = resolution.cache_control
        && let Ok(value) = HeaderValue::from_str(&cache_control)
    {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Some(warning) = resolution.warning {
        headers.insert(header::WARNING, HeaderValue::from_static(warning));
    }
    if let Some(retry_after) = resolution.retry_after
        && let Ok(value) = HeaderValue::from_str(&retry_after)
    {
        headers.insert(header::RETRY_AFTER, value);
    }

    response
}

/// GET /{*path} - fetch a resource through the cache
async fn proxy_resource(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(path): Path<String>,
    Query(query): Query<UaQuery>,
    headers: HeaderMap,
) -> Response {
    let identity = client_identity(&headers, peer);
    let client_user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    debug!("GET /{} for client {}", path, identity);

    let resolution = state
        .resolver
        .resolve(ProxyRequest {
            identity,
            path,
            ua: UaSelection {
                policy: query.policy(),
                client_user_agent,
            },
        })
        .await;

    into_response(resolution)
}

/// Create proxy routes
///
/// Only GET is registered; other methods on the wildcard are answered
/// with 405 by the router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/{*path}", get(proxy_resource))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use bytes::Bytes;

    fn resolution() -> Resolution {
        Resolution {
            status: StatusCode::OK,
            body: Bytes::from_static(b"img"),
            content_type: Some("image/png".to_string()),
            cache_control: Some("public, max-age=60".to_string()),
            warning: None,
            retry_after: None,
        }
    }

    #[test]
    fn test_query_policy() {
        let query = UaQuery {
            mobile: Some("1".to_string()),
            ..UaQuery::default()
        };
        assert_eq!(query.policy(), UaPolicy::Mobile);

        let query = UaQuery {
            rotate: Some("1".to_string()),
            ..UaQuery::default()
        };
        assert_eq!(query.policy(), UaPolicy::Rotate);

        // Only the literal "1" activates a directive
        let query = UaQuery {
            desktop: Some("yes".to_string()),
            ..UaQuery::default()
        };
        assert_eq!(query.policy(), UaPolicy::Auto);
    }

    #[test]
    fn test_client_identity_prefers_forwarded_for() {
        let peer: SocketAddr = "192.0.2.7:4242".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(client_identity(&headers, peer), "203.0.113.9");

        assert_eq!(client_identity(&HeaderMap::new(), peer), "192.0.2.7");
    }

    #[test]
    fn test_response_carries_resolution_headers() {
        let response = into_response(resolution());

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=60");
        assert!(response.headers().get(header::WARNING).is_none());
    }

    #[test]
    fn test_response_carries_warning_and_retry_after() {
        let mut stale = resolution();
        stale.warning = Some(pixgate_core::resolver::WARN_REVALIDATION_FAILED);
        stale.retry_after = Some("120".to_string());
        stale.cache_control = None;

        let response = into_response(stale);

        assert_eq!(
            response.headers()[header::WARNING],
            "111 - \"Revalidation failed\""
        );
        assert_eq!(response.headers()[header::RETRY_AFTER], "120");
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }
}
