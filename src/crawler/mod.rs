//! Crawler module for web page fetching and indexing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with politeness delay and error classification
//! - HTML parsing (visible text, links, title)
//! - Per-site crawl workers with frontier and dedup management
//! - Run orchestration, cancellation and single-page re-indexing

mod fetcher;
mod indexer;
mod orchestrator;
mod parser;
mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use fetcher::{
    FetchError, FetchedPage, HttpTransport, PageFetcher, RawResponse, Transport, TransportError,
    CONNECTION_FAILED_MESSAGE,
};
pub use indexer::{IndexedPage, PageIndexer};
pub use orchestrator::Orchestrator;
pub use parser::{parse_html, ParsedPage};
pub use worker::{SiteWorker, WorkerOutcome};
