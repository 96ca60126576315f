//! lemma-search: a site crawler with a lemma-keyed inverted index
//!
//! This crate crawls a configured set of websites, stores their pages in SQLite,
//! indexes page text by normalized word roots (lemmas), and answers ranked
//! all-words search queries with snippets.

pub mod config;
pub mod crawler;
pub mod lemma;
pub mod search;
pub mod service;
pub mod state;
pub mod stats;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for lemma-search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Indexing is already running")]
    AlreadyRunning,

    #[error("Indexing is not running")]
    NotRunning,

    #[error("Page is outside the sites listed in the configuration: {url}")]
    OutOfScope { url: String },

    #[error("Page is already being re-indexed: {url}")]
    PageBusy { url: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("No Tokio runtime available to spawn crawl workers")]
    NoRuntime,

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for lemma-search operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use lemma::Lemmatizer;
pub use search::{SearchResult, SearchResults};
pub use service::SearchService;
pub use state::SiteStatus;
pub use stats::Statistics;
