//! Async content fetcher wrapping reqwest.
//!
//! Plain HTTP GET, no rendering. Follows redirects itself so the chain
//! depth can be bounded, decodes gzip/deflate/brotli bodies, resolves hosts
//! through the public resolver override, and bounds the whole exchange by
//! one timeout.

use super::resolver::PublicResolver;
use crate::config::FetchConfig;
use crate::deadline::Deadline;
use crate::error::{AcquireError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, LOCATION};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A GET request for the fetcher.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    /// Extra headers; override the defaults of the same name.
    pub headers: Vec<(String, String)>,
    /// Overrides the fetcher's configured timeout.
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Response from a successful fetch.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// Response headers (selected subset).
    pub headers: Vec<(String, String)>,
    /// Decoded response body.
    pub body: String,
    /// URLs that answered with a redirect, in order.
    pub redirect_chain: Vec<String>,
}

impl FetchResult {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP client for plain retrieval.
#[derive(Clone)]
pub struct ContentFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_redirects: usize,
}

impl ContentFetcher {
    /// Build a fetcher from configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.as_str())
            .default_headers(default_headers())
            .gzip(true)
            .deflate(true)
            .brotli(true);

        if !config.public_resolvers.is_empty() {
            builder = builder.dns_resolver(Arc::new(PublicResolver::new(&config.public_resolvers)));
        }

        let client = builder
            .build()
            .map_err(|e| AcquireError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        })
    }

    /// Fetch `request`, bounded by the request timeout and `deadline`.
    pub async fn fetch(&self, request: &FetchRequest, deadline: &Deadline) -> Result<FetchResult> {
        let timeout = request.timeout.unwrap_or(self.timeout);
        let result = deadline
            .run_step("fetch", timeout, self.follow(request))
            .await;
        match &result {
            Ok(resp) => tracing::debug!(
                "fetched {} ({} bytes, {} redirect(s))",
                resp.final_url,
                resp.body.len(),
                resp.redirect_chain.len()
            ),
            Err(e) => tracing::debug!("fetch of {} failed: {e}", request.url),
        }
        result
    }

    /// Shorthand for a GET with default headers.
    pub async fn get(&self, url: &str, deadline: &Deadline) -> Result<FetchResult> {
        self.fetch(&FetchRequest::get(url), deadline).await
    }

    async fn follow(&self, request: &FetchRequest) -> Result<FetchResult> {
        let mut current = Url::parse(&request.url)
            .map_err(|e| AcquireError::InvalidTarget(format!("{}: {e}", request.url)))?;
        let mut chain: Vec<String> = Vec::new();

        loop {
            let mut builder = self.client.get(current.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let resp = builder.send().await?;
            let status = resp.status();

            if status.is_redirection() {
                let location = resp
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| AcquireError::Http {
                        status: status.as_u16(),
                        url: current.to_string(),
                    })?;

                if chain.len() >= self.max_redirects {
                    return Err(AcquireError::RedirectLoop {
                        max: self.max_redirects,
                        url: request.url.clone(),
                    });
                }

                let next = current.join(location).map_err(|e| {
                    AcquireError::InvalidTarget(format!("bad redirect location {location}: {e}"))
                })?;
                tracing::debug!("redirect {} -> {}", current, next);
                chain.push(current.to_string());
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(AcquireError::Http {
                    status: status.as_u16(),
                    url: current.to_string(),
                });
            }

            let headers: Vec<(String, String)> = resp
                .headers()
                .iter()
                .filter(|(k, _)| {
                    matches!(
                        k.as_str(),
                        "content-type" | "content-language" | "last-modified" | "cache-control"
                    )
                })
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect();

            let body = resp.text().await?;

            return Ok(FetchResult {
                url: request.url.clone(),
                final_url: current.to_string(),
                status: status.as_u16(),
                headers,
                body,
                redirect_chain: chain,
            });
        }
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-AU,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("upgrade-insecure-requests"),
        HeaderValue::from_static("1"),
    );
    headers
}
