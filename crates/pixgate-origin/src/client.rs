//! Origin HTTP client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, RETRY_AFTER};
use tracing::{debug, info};
use url::Url;

use crate::error::FetchError;
use crate::fetcher::{FetchOutcome, OriginFetcher, OriginMetadata, Revalidators, UaSelection};
use crate::headers::{UaPolicy, build_upstream_headers, select_user_agent};

/// Origin client configuration
#[derive(Clone, Debug)]
pub struct OriginClientConfig {
    /// Base URL of the upstream image host
    pub base_url: String,
    /// Referer sent with every upstream request
    pub referer: String,
    /// Hard timeout for one outbound request, in seconds
    pub timeout_secs: u64,
}

impl Default for OriginClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://i.imgur.com".to_string(),
            referer: "https://imgur.com/".to_string(),
            timeout_secs: 10,
        }
    }
}

/// HTTP client for the upstream origin
pub struct OriginClient {
    config: OriginClientConfig,
    client: Client,
}

impl OriginClient {
    /// Create a new origin client
    pub fn new(config: OriginClientConfig) -> Result<Self, FetchError> {
        // Fail fast on an unusable base URL rather than per request
        Url::parse(&config.base_url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!("Created origin client for {}", config.base_url);

        Ok(Self { config, client })
    }

    fn resource_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Assemble the full upstream header set for one request: realism
    /// headers, selected User-Agent, and conditional revalidators.
    fn request_headers(&self, revalidators: Option<&Revalidators>, ua: &UaSelection) -> HeaderMap {
        let coin = matches!(ua.policy, UaPolicy::Rotate) && rand::random();
        let agent = select_user_agent(ua.policy, ua.client_user_agent.as_deref(), coin);

        let mut headers =
            build_upstream_headers(agent, ua.client_user_agent.as_deref(), &self.config.referer);

        if let Some(revalidators) = revalidators {
            if let Some(etag) = revalidators.etag.as_deref()
                && let Ok(value) = HeaderValue::from_str(etag)
            {
                headers.insert(IF_NONE_MATCH, value);
            }
            if let Some(last_modified) = revalidators.last_modified.as_deref()
                && let Ok(value) = HeaderValue::from_str(last_modified)
            {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        headers
    }
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

#[async_trait]
impl OriginFetcher for OriginClient {
    async fn fetch(
        &self,
        path: &str,
        revalidators: Option<Revalidators>,
        ua: UaSelection,
    ) -> Result<FetchOutcome, FetchError> {
        let url = self.resource_url(path);
        let headers = self.request_headers(revalidators.as_ref(), &ua);

        debug!("Fetching upstream: {}", url);

        let response = self.client.get(&url).headers(headers).send().await?;
        let status = response.status();

        match status {
            StatusCode::NOT_MODIFIED => Ok(FetchOutcome::NotModified),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = header_string(response.headers(), RETRY_AFTER);
                Ok(FetchOutcome::Throttled { retry_after })
            }
            s if s.is_success() => {
                let meta = OriginMetadata {
                    etag: header_string(response.headers(), reqwest::header::ETAG),
                    last_modified: header_string(response.headers(), reqwest::header::LAST_MODIFIED),
                    content_type: header_string(response.headers(), reqwest::header::CONTENT_TYPE),
                    cache_control: header_string(response.headers(), reqwest::header::CACHE_CONTROL),
                };

                // A truncated body surfaces as a transport error here
                let body = response.bytes().await?;

                Ok(FetchOutcome::Success { body, meta })
            }
            s => {
                let body = response.bytes().await.unwrap_or_default();
                Ok(FetchOutcome::Failed { status: s, body })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{DESKTOP_UA, MOBILE_UA};

    fn test_client() -> OriginClient {
        OriginClient::new(OriginClientConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = OriginClient::new(OriginClientConfig {
            base_url: "not a url".to_string(),
            ..OriginClientConfig::default()
        });
        assert!(matches!(result, Err(FetchError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_resource_url_joins_path() {
        let client = test_client();
        assert_eq!(client.resource_url("abc123.jpg"), "https://i.imgur.com/abc123.jpg");
        assert_eq!(client.resource_url("a/b.png"), "https://i.imgur.com/a/b.png");
    }

    #[test]
    fn test_conditional_headers_attached_from_revalidators() {
        let client = test_client();
        let revalidators = Revalidators {
            etag: Some("\"abc\"".to_string()),
            last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
        };

        let headers = client.request_headers(Some(&revalidators), &UaSelection::default());

        assert_eq!(headers.get(IF_NONE_MATCH).unwrap(), "\"abc\"");
        assert_eq!(
            headers.get(IF_MODIFIED_SINCE).unwrap(),
            "Wed, 21 Oct 2015 07:28:00 GMT"
        );
    }

    #[test]
    fn test_no_conditional_headers_without_revalidators() {
        let client = test_client();
        let headers = client.request_headers(None, &UaSelection::default());

        assert!(headers.get(IF_NONE_MATCH).is_none());
        assert!(headers.get(IF_MODIFIED_SINCE).is_none());
    }

    #[test]
    fn test_ua_selection_applied_to_headers() {
        let client = test_client();

        let mobile = UaSelection {
            policy: UaPolicy::Mobile,
            client_user_agent: Some("curl/8.0".to_string()),
        };
        let headers = client.request_headers(None, &mobile);
        assert_eq!(headers.get(reqwest::header::USER_AGENT).unwrap(), MOBILE_UA);
        assert_eq!(headers.get("x-forwarded-user-agent").unwrap(), "curl/8.0");

        let auto = UaSelection {
            policy: UaPolicy::Auto,
            client_user_agent: Some("curl/8.0".to_string()),
        };
        let headers = client.request_headers(None, &auto);
        assert_eq!(headers.get(reqwest::header::USER_AGENT).unwrap(), DESKTOP_UA);
    }
}
