use serde::Deserialize;

/// Main configuration structure for lemma-search
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Sites to crawl, in reporting order
    #[serde(rename = "site", default)]
    pub sites: Vec<SiteEntry>,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub search: SearchConfig,

    pub output: OutputConfig,
}

/// A configured site: root URL plus display name
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    /// Root URL of the site (e.g., "https://example.com")
    pub url: String,

    /// Human-readable site name
    pub name: String,
}

/// HTTP connection and politeness configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Referer header sent with every request
    #[serde(default = "default_referrer")]
    pub referrer: String,

    /// Request timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Fixed part of the pause before each request (milliseconds)
    #[serde(rename = "delay-base-ms", default = "default_delay_base_ms")]
    pub delay_base_ms: u64,

    /// Upper bound of the random part of the pause (milliseconds)
    #[serde(rename = "delay-jitter-ms", default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,
}

/// Query engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Lemmas found on more than this share of pages do not drive ranking
    #[serde(rename = "frequency-cutoff", default = "default_frequency_cutoff")]
    pub frequency_cutoff: f64,

    /// Offset used when a search request omits one
    #[serde(rename = "default-offset", default)]
    pub default_offset: usize,

    /// Limit used when a search request omits one
    #[serde(rename = "default-limit", default = "default_limit")]
    pub default_limit: usize,

    /// Length of a result snippet, in words
    #[serde(rename = "snippet-words", default = "default_snippet_words")]
    pub snippet_words: usize,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_user_agent() -> String {
    "LemmaSearchBot/0.1 (+https://github.com/lemma-search)".to_string()
}

fn default_referrer() -> String {
    "https://www.google.com".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_delay_base_ms() -> u64 {
    500
}

fn default_delay_jitter_ms() -> u64 {
    4500
}

fn default_frequency_cutoff() -> f64 {
    0.8
}

fn default_limit() -> usize {
    20
}

fn default_snippet_words() -> usize {
    30
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            referrer: default_referrer(),
            timeout_ms: default_timeout_ms(),
            delay_base_ms: default_delay_base_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            frequency_cutoff: default_frequency_cutoff(),
            default_offset: 0,
            default_limit: default_limit(),
            snippet_words: default_snippet_words(),
        }
    }
}
