use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use std::time::Duration;

use crate::error::{ApiError, TransportError};

/// Per-request configuration supplied by callers of the authenticated verbs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    /// Extra request headers
    pub headers: HeaderMap,

    /// Query string pairs appended to the URL
    pub query: Vec<(String, String)>,

    /// Per-request timeout, overriding the transport default
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header, rejecting names or values that are not valid HTTP
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::InvalidRequest(format!("header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidRequest(format!("header value for {}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Merge an auth header into an optional caller configuration
///
/// Returns a new configuration: every field of `config` is kept and its
/// headers are unioned with `header`, with `header` winning on conflict.
/// An absent configuration yields one that carries only `header`.
pub fn merge_config(config: Option<&RequestConfig>, header: &HeaderMap) -> RequestConfig {
    match config {
        None => RequestConfig {
            headers: header.clone(),
            ..RequestConfig::default()
        },
        Some(config) => {
            let mut merged = config.clone();
            for (name, value) in header {
                merged.headers.insert(name.clone(), value.clone());
            }
            merged
        }
    }
}

/// Join a base URL and a relative path with exactly one slash between them
pub fn join_url(base_url: &str, path: &str) -> String {
    if path.is_empty() {
        return base_url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// HTTP transport bound to one Elation base URL
pub struct Transport {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Base URL every path is resolved against
    base_url: String,
}

impl Transport {
    /// Create a new transport
    pub fn new(
        base_url: impl Into<String>,
        max_connections: usize,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .pool_max_idle_per_host(max_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .default_headers(default_headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a path against the base URL
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Send one request and return the response if its status is 2xx
    ///
    /// Non-2xx responses are turned into `TransportError::Status` carrying
    /// the response body. Nothing is retried.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        config: RequestConfig,
    ) -> Result<Response, TransportError> {
        let url = self.url(path);

        tracing::debug!(
            method = %method,
            url = %url,
            has_body = body.is_some(),
            "Sending HTTP request"
        );

        let mut builder = self.client.request(method.clone(), &url).headers(config.headers);
        if !config.query.is_empty() {
            builder = builder.query(&config.query);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection_failed"
                } else if e.is_request() {
                    "request_error"
                } else {
                    "unknown"
                };
                tracing::warn!(
                    error_kind = error_kind,
                    error = %e,
                    method = %method,
                    url = %url,
                    "HTTP request error"
                );
                return Err(TransportError::Http(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = %status, "Received HTTP response");
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            status = status.as_u16(),
            method = %method,
            url = %url,
            response_body = %error_text,
            "HTTP request failed with error response"
        );

        Err(TransportError::Status {
            status: status.as_u16(),
            body: error_text,
        })
    }
}
