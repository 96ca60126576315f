//! Search module for lemma-search
//!
//! Turns a query into lemmas, intersects the pages containing all of them,
//! ranks the candidates by summed index weight and builds snippets for the
//! requested slice of results.

mod engine;
mod snippet;

pub use engine::QueryEngine;
pub use snippet::SnippetBuilder;

/// A validated search request
#[derive(Debug, Clone, Copy)]
pub struct SearchQuery<'a> {
    /// Query text
    pub text: &'a str,

    /// Root URL of the one site to search, or None for all sites
    pub site: Option<&'a str>,

    /// Number of ranked results to skip
    pub offset: usize,

    /// Maximum number of results to return
    pub limit: usize,
}

/// One ranked page
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Root URL of the page's site
    pub site: String,

    /// Display name of the page's site
    pub site_name: String,

    /// Page path (with query string)
    pub uri: String,

    /// Page title, empty if the page has none
    pub title: String,

    /// Text excerpt with matches wrapped in `<b>..</b>`
    pub snippet: String,

    /// Relevance relative to the best result, in (0, 1]
    pub relevance: f64,
}

/// A page of search results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// Number of matching pages before pagination
    pub count: usize,

    /// Results in the requested window
    pub items: Vec<SearchResult>,
}
