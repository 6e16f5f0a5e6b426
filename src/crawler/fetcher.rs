//! HTTP fetcher implementation
//!
//! This module defines the fetch capability the engine consumes and its
//! default implementation on reqwest:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with a per-request timeout
//! - Redirect following (bounded)
//! - Error classification into transient and permanent failures

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::{header::HeaderMap, redirect::Policy, Client};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A response received from a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,

    /// Response headers, names lower-cased
    pub headers: HashMap<String, String>,

    pub body: String,

    /// URL the content was finally served from, when redirects were followed
    pub final_url: Option<Url>,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
            final_url: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_final_url(mut self, url: Url) -> Self {
        self.final_url = Some(url);
        self
    }

    /// Looks up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// The redirect target, if any
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// Parses a `Retry-After` header given in seconds
    ///
    /// HTTP-date values are not supported and yield `None`.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Classifies the response status
    pub fn classify(&self) -> ResponseClass {
        match self.status {
            200..=299 => ResponseClass::Success,
            300..=399 => match self.location() {
                Some(_) => ResponseClass::Redirect,
                None => ResponseClass::Permanent,
            },
            429 | 500..=599 => ResponseClass::Transient,
            _ => ResponseClass::Permanent,
        }
    }
}

/// How the worker treats a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx: content is handed to extraction
    Success,

    /// 3xx with a `Location` header
    Redirect,

    /// 429 and 5xx: retried with backoff
    Transient,

    /// Any other status: failed without retry
    Permanent,
}

/// Category of a fetch failure that produced no response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Timeout,
    Connect,
    MalformedResponse,
    Other,
}

impl FetchErrorKind {
    /// Returns true if the failure is worth retrying
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::MalformedResponse)
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connection error",
            Self::MalformedResponse => "malformed response",
            Self::Other => "fetch error",
        };
        f.write_str(name)
    }
}

/// A fetch that produced no usable response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FetchErrorKind::Timeout,
            format!("no response within {:?}", after),
        )
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            FetchErrorKind::Timeout
        } else if e.is_connect() {
            FetchErrorKind::Connect
        } else if e.is_decode() || e.is_body() || e.is_redirect() {
            FetchErrorKind::MalformedResponse
        } else {
            FetchErrorKind::Other
        };
        Self::new(kind, e.to_string())
    }
}

/// The fetch capability consumed by the worker pool
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`, giving up after `timeout`
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchResponse, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `max_redirects` - Redirect hops followed before the 3xx is returned as is
///
/// # Example
///
/// ```no_run
/// use ripple_crawl::config::UserAgentConfig;
/// use ripple_crawl::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "RippleCrawl".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, 10).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    max_redirects: u32,
) -> Result<Client, reqwest::Error> {
    let redirect = if max_redirects == 0 {
        Policy::none()
    } else {
        Policy::limited(max_redirects as usize)
    };

    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(redirect)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Default `Fetcher` backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a fetcher with the crawler's user agent
    pub fn from_config(
        config: &UserAgentConfig,
        max_redirects: u32,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config, max_redirects)?))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = collect_headers(response.headers());
        let body = response.text().await?;

        tracing::trace!("GET {} -> {} ({} bytes)", url, status, body.len());

        Ok(FetchResponse {
            status,
            headers,
            body,
            final_url: Some(final_url),
        })
    }
}

fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_config();
        assert!(build_http_client(&config, 10).is_ok());
        assert!(build_http_client(&config, 0).is_ok());
    }

    #[test]
    fn test_user_agent_format() {
        let config = create_test_config();
        assert_eq!(
            config.header_value(),
            "TestCrawler/1.0 (+https://example.com/about; admin@example.com)"
        );
    }

    #[test]
    fn test_classify_statuses() {
        assert_eq!(FetchResponse::new(200, "").classify(), ResponseClass::Success);
        assert_eq!(FetchResponse::new(204, "").classify(), ResponseClass::Success);
        assert_eq!(FetchResponse::new(429, "").classify(), ResponseClass::Transient);
        assert_eq!(FetchResponse::new(503, "").classify(), ResponseClass::Transient);
        assert_eq!(FetchResponse::new(404, "").classify(), ResponseClass::Permanent);
        assert_eq!(FetchResponse::new(410, "").classify(), ResponseClass::Permanent);
        assert_eq!(FetchResponse::new(301, "").classify(), ResponseClass::Permanent);
        assert_eq!(
            FetchResponse::new(301, "")
                .with_header("Location", "/moved")
                .classify(),
            ResponseClass::Redirect
        );
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let response = FetchResponse::new(200, "")
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_header("Retry-After", " 7 ");

        assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(response.header("CONTENT-TYPE"), response.content_type());
        assert_eq!(response.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_retry_after_http_date_is_ignored() {
        let response = FetchResponse::new(429, "")
            .with_header("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(response.retry_after(), None);
    }

    #[test]
    fn test_error_kinds() {
        assert!(FetchError::timeout(Duration::from_secs(1)).is_transient());
        assert!(FetchError::new(FetchErrorKind::Connect, "refused").is_transient());
        assert!(FetchError::new(FetchErrorKind::Other, "reset").is_transient());
        assert!(!FetchError::new(FetchErrorKind::MalformedResponse, "bad").is_transient());
    }
}
