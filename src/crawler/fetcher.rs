//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - The `Transport` seam and its reqwest-backed implementation
//! - Politeness delay between requests, cut short by cancellation
//! - Content-Type filtering
//! - Error classification and the FAILED side effect on the owning site

use crate::config::ConnectionConfig;
use crate::state::SiteStatus;
use crate::storage::{self, SharedStorage, Storage};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, REFERER};
use reqwest::{redirect::Policy, Client};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Error text stored on a site whose server could not be reached
pub const CONNECTION_FAILED_MESSAGE: &str =
    "Server response timed out; indexing could not be completed";

/// Maximum number of redirects followed for one request
const MAX_REDIRECTS: usize = 10;

/// Errors raised by a transport before any HTTP status is known
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// Errors returned by the page fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Could not fetch {url}: {source}")]
    ConnectionFailed {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Skipped {url}: unsupported content type {content_type}")]
    UnsupportedContent { url: String, content_type: String },

    #[error("Cancelled before fetching {url}")]
    Cancelled { url: String },
}

/// A response as seen by the fetcher, whatever the transport
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// URL of the final response after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    /// Response body
    pub body: String,
}

/// Sends one GET request
pub trait Transport: Send + Sync + 'static {
    /// Fetches a URL, following redirects
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// Transport backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds an HTTP client with proper configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The connection configuration
    ///
    /// # Returns
    ///
    /// * `Ok(HttpTransport)` - Successfully built HTTP client
    /// * `Err(reqwest::Error)` - Failed to build client
    pub fn new(config: &ConnectionConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        if !config.referrer.is_empty() {
            if let Ok(referrer) = HeaderValue::from_str(&config.referrer) {
                headers.insert(REFERER, referrer);
            }
        }

        let timeout = Duration::from_millis(config.timeout_ms);
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url) -> Result<RawResponse, TransportError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(RawResponse {
            final_url,
            status,
            content_type,
            body,
        })
    }
}

/// A page fetched and accepted for indexing
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested (normalized)
    pub url: Url,

    /// The URL the response came from; base for relative links
    pub final_url: Url,

    /// HTTP status code
    pub status_code: u16,

    /// Page body content
    pub body: String,
}

/// Returns true for HTML content types (or when none was sent)
fn is_html(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    matches!(mime.as_str(), "text/html" | "application/xhtml+xml")
}

/// Fetches single pages on behalf of site workers
pub struct PageFetcher<T: Transport> {
    transport: Arc<T>,
    storage: SharedStorage,
    delay_base_ms: u64,
    delay_jitter_ms: u64,
}

impl<T: Transport> PageFetcher<T> {
    /// Creates a fetcher
    ///
    /// # Arguments
    ///
    /// * `transport` - Transport used for every request
    /// * `storage` - Storage where a failing site is marked FAILED
    /// * `config` - Connection configuration (politeness delay)
    pub fn new(transport: T, storage: SharedStorage, config: &ConnectionConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            storage,
            delay_base_ms: config.delay_base_ms,
            delay_jitter_ms: config.delay_jitter_ms,
        }
    }

    /// Fetches one page of a site
    ///
    /// When `run` is given, a politeness delay is applied first; the delay
    /// ends early (with `FetchError::Cancelled`) if the run is cancelled.
    /// Without `run` the request is sent immediately.
    ///
    /// # Arguments
    ///
    /// * `url` - The normalized URL to fetch
    /// * `site_id` - The owning site, marked FAILED on connection failure
    /// * `run` - Cancellation token of the active crawl run, if any
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - The page, whatever its status code
    /// * `Err(FetchError)` - Connection failure, non-HTML content or cancellation
    pub async fn fetch(
        &self,
        url: &Url,
        site_id: i64,
        run: Option<&CancellationToken>,
    ) -> Result<FetchedPage, FetchError> {
        if let Some(token) = run {
            if !self.politeness_delay(token).await {
                return Err(FetchError::Cancelled {
                    url: url.to_string(),
                });
            }
        }

        debug!("Fetching {}", url);
        let response = match self.transport.fetch(url).await {
            Ok(response) => response,
            Err(source) => {
                warn!("Fetch failed for {}: {}", url, source);
                self.mark_site_failed(site_id);
                return Err(FetchError::ConnectionFailed {
                    url: url.to_string(),
                    source,
                });
            }
        };

        if response.status < 400 && !is_html(response.content_type.as_deref()) {
            return Err(FetchError::UnsupportedContent {
                url: url.to_string(),
                content_type: response.content_type.unwrap_or_default(),
            });
        }

        Ok(FetchedPage {
            url: url.clone(),
            final_url: response.final_url,
            status_code: response.status,
            body: response.body,
        })
    }

    /// Sleeps `base + random(0..=jitter)` ms; returns false if cancelled
    async fn politeness_delay(&self, token: &CancellationToken) -> bool {
        if token.is_cancelled() {
            return false;
        }

        let jitter = if self.delay_jitter_ms > 0 {
            rand::rng().random_range(0..=self.delay_jitter_ms)
        } else {
            0
        };
        let delay = Duration::from_millis(self.delay_base_ms + jitter);
        if delay.is_zero() {
            return true;
        }

        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn mark_site_failed(&self, site_id: i64) {
        let result = storage::lock(&self.storage).and_then(|mut storage| {
            storage
                .update_site_status(site_id, SiteStatus::Failed, Some(CONNECTION_FAILED_MESSAGE))
                .map_err(Into::into)
        });
        if let Err(e) = result {
            warn!("Could not mark site {} as failed: {}", site_id, e);
        }
    }
}
