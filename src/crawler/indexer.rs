use crate::crawler::fetcher::FetchedPage;
use crate::crawler::parser::parse_html;
use crate::lemma::Lemmatizer;
use crate::storage::{self, NewPage, SharedStorage, Storage};
use crate::url::{normalize_url, page_path};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Outcome of storing one fetched page
#[derive(Debug, Clone)]
pub struct IndexedPage {
    pub page_id: i64,
    pub path: String,
    pub status_code: u16,
    pub lemma_count: usize,

    /// Normalized links found on the page (empty for error pages)
    pub links: Vec<Url>,
}

/// Turns fetched pages into stored pages plus index entries
#[derive(Clone)]
pub struct PageIndexer {
    storage: SharedStorage,
    lemmatizer: Arc<Lemmatizer>,
}

impl PageIndexer {
    pub fn new(storage: SharedStorage, lemmatizer: Arc<Lemmatizer>) -> Self {
        Self {
            storage,
            lemmatizer,
        }
    }

    /// Stores a fetched page, replacing any previous version of it
    ///
    /// Pages answered with an error status are stored without lemmas and
    /// yield no links.
    pub fn index(&self, site_id: i64, page: &FetchedPage) -> Result<IndexedPage> {
        let path = page_path(&page.url);

        let (lemmas, links) = if page.status_code < 400 {
            let parsed = parse_html(&page.body, &page.final_url);
            let lemmas = self.lemmatizer.lemmatize(&parsed.indexable_text());
            let links = parsed
                .links
                .iter()
                .filter_map(|link| normalize_url(link.as_str()).ok())
                .collect();
            (lemmas, links)
        } else {
            (HashMap::new(), Vec::new())
        };

        let new_page = NewPage {
            path: &path,
            code: page.status_code,
            content: &page.body,
        };
        let page_id = storage::lock(&self.storage)?.save_page(site_id, &new_page, &lemmas)?;

        debug!(
            "Indexed {} (status {}, {} lemmas)",
            page.url,
            page.status_code,
            lemmas.len()
        );

        Ok(IndexedPage {
            page_id,
            path,
            status_code: page.status_code,
            lemma_count: lemmas.len(),
            links,
        })
    }
}
