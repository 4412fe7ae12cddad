//! Network fetch capability used by the offline cache.
//!
//! ### Requests
//! - Targets are resolved against the application origin (see [`url::resolve`])
//! - Navigation requests are flagged so a failed fetch can fall back to the
//!   cached root document
//!
//! ### Responses
//! - Any HTTP status is a response, not an error; only transport failures
//!   (DNS, connect, reset, body read) are `NetworkFetch` errors
//! - Max body bytes: 5MB (configurable)
//! - Max redirects: 5

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, StatusCode, Url, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, resolve, same_origin};

use firecalc_core::storage::compute_request_key;
use firecalc_core::{AppConfig, Error};

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "firecalc/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Transport timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "firecalc/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::default()
        }
    }
}

/// An outbound resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub method: Method,
    pub url: Url,
    /// Top-level document navigation.
    pub navigate: bool,
}

impl AssetRequest {
    /// A request with a textual method, as received from a caller.
    pub fn new(method: &str, url: Url, navigate: bool) -> Result<Self, Error> {
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid HTTP method: {method}")))?;
        Ok(Self { method, url, navigate })
    }

    /// A plain GET for a subresource.
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, navigate: false }
    }

    /// A GET navigating to a document.
    pub fn navigation(url: Url) -> Self {
        Self { method: Method::GET, url, navigate: true }
    }

    /// Whether the request targets markup: a navigation, a directory path or an `.html` file.
    pub fn is_document(&self) -> bool {
        let path = self.url.path();
        self.navigate || path.ends_with('/') || path.ends_with(".html")
    }

    /// Cache key of this request.
    pub fn cache_key(&self) -> String {
        compute_request_key(self.method.as_str(), self.url.as_str())
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The original URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// Anything able to perform a live fetch.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &AssetRequest) -> Result<FetchResponse, Error>;
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::NetworkFetch(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &AssetRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .send()
            .await
            .map_err(|e| Error::NetworkFetch(format!("{}: {}", request.url, e)))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::NetworkFetch(format!(
                "{}: {} bytes exceeds {}",
                request.url, len, self.config.max_bytes
            )));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkFetch(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::NetworkFetch(format!(
                "{}: {} bytes exceeds {}",
                request.url,
                bytes.len(),
                self.config.max_bytes
            )));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} ({}) in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            fetch_ms,
            bytes.len()
        );

        Ok(FetchResponse { url: request.url.clone(), final_url, status, content_type, bytes, fetch_ms })
    }
}
