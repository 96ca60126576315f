//! In-memory transport for crawler unit tests

use super::fetcher::{RawResponse, Transport, TransportError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// A canned response
#[derive(Debug, Clone)]
pub(crate) enum StaticPage {
    Page {
        status: u16,
        content_type: String,
        body: String,
    },
    Unreachable,

    /// The transport panics while serving this URL
    Panic,
}

impl StaticPage {
    pub(crate) fn html(body: &str) -> Self {
        Self::with_type("text/html; charset=utf-8", body)
    }

    pub(crate) fn with_type(content_type: &str, body: &str) -> Self {
        Self::Page {
            status: 200,
            content_type: content_type.to_string(),
            body: body.to_string(),
        }
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self::Page {
            status,
            content_type: "text/html".to_string(),
            body: body.to_string(),
        }
    }
}

/// Serves canned pages by exact URL; unknown URLs answer 404
#[derive(Debug, Default)]
pub(crate) struct StaticTransport {
    pages: HashMap<String, StaticPage>,
    latency: Duration,
    requests: Mutex<Vec<String>>,
}

impl StaticTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(mut self, url: &str, page: StaticPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// URLs requested so far, in order
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for StaticTransport {
    async fn fetch(&self, url: &Url) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.pages.get(url.as_str()) {
            Some(StaticPage::Page {
                status,
                content_type,
                body,
            }) => Ok(RawResponse {
                final_url: url.clone(),
                status: *status,
                content_type: Some(content_type.clone()),
                body: body.clone(),
            }),
            Some(StaticPage::Unreachable) => {
                Err(TransportError::Connect("connection refused".to_string()))
            }
            Some(StaticPage::Panic) => panic!("transport failed hard on {}", url),
            None => Ok(RawResponse {
                final_url: url.clone(),
                status: 404,
                content_type: Some("text/html".to_string()),
                body: "<html><body>Not Found</body></html>".to_string(),
            }),
        }
    }
}

impl Transport for std::sync::Arc<StaticTransport> {
    async fn fetch(&self, url: &Url) -> Result<RawResponse, TransportError> {
        self.as_ref().fetch(url).await
    }
}
