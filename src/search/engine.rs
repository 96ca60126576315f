//! Relevance-ranked all-words search over the lemma index

use crate::config::SearchConfig;
use crate::crawler::parse_html;
use crate::lemma::Lemmatizer;
use crate::search::snippet::SnippetBuilder;
use crate::search::{SearchQuery, SearchResult, SearchResults};
use crate::storage::{self, SharedStorage, SiteRecord, SqliteStorage, Storage};
use crate::url::SiteScope;
use crate::{Result, SearchError, UrlError};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// A query lemma with its frequency in the searched sites
struct QueryLemma {
    lemma: String,
    frequency: u64,
}

/// A candidate page with its relevance
struct Ranked {
    page_id: i64,
    absolute: f64,
}

/// Answers search queries from the index store
pub struct QueryEngine {
    storage: SharedStorage,
    lemmatizer: Arc<Lemmatizer>,
    scope: Arc<SiteScope>,
    config: SearchConfig,
}

impl QueryEngine {
    pub fn new(
        storage: SharedStorage,
        lemmatizer: Arc<Lemmatizer>,
        scope: Arc<SiteScope>,
        config: SearchConfig,
    ) -> Self {
        Self {
            storage,
            lemmatizer,
            scope,
            config,
        }
    }

    /// Runs an all-words query
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResults)` - Total match count and the requested page of results
    /// * `Err(SearchError::InvalidQuery)` - The query is blank
    /// * `Err(SearchError::OutOfScope)` - The site filter names no configured site
    pub fn search(&self, query: &SearchQuery<'_>) -> Result<SearchResults> {
        if query.text.trim().is_empty() {
            return Err(SearchError::InvalidQuery("query is empty".to_string()));
        }

        let lemmas: HashSet<String> = self.lemmatizer.lemmatize(query.text).into_keys().collect();
        if lemmas.is_empty() {
            debug!("Query {:?} has no indexable words", query.text);
            return Ok(SearchResults::default());
        }

        let storage = storage::lock(&self.storage)?;
        let sites = self.sites_in_scope(&storage, query.site)?;
        let site_ids: Vec<i64> = sites.keys().copied().collect();

        let Some(ranked) = self.rank(&storage, &lemmas, &site_ids)? else {
            return Ok(SearchResults::default());
        };

        let count = ranked.len();
        let max = ranked.first().map_or(1.0, |r| r.absolute);
        let snippets = SnippetBuilder::new(&self.lemmatizer, &lemmas, self.config.snippet_words);

        let mut items = Vec::new();
        for candidate in ranked.iter().skip(query.offset).take(query.limit) {
            let Some(page) = storage.get_page(candidate.page_id)? else {
                continue;
            };
            let Some(site) = sites.get(&page.site_id) else {
                continue;
            };

            let base = Url::parse(&site.url).map_err(|e| UrlError::Parse(e.to_string()))?;
            let parsed = parse_html(&page.content, &base);

            items.push(SearchResult {
                site: site.url.clone(),
                site_name: site.name.clone(),
                uri: page.path,
                title: parsed.title.clone().unwrap_or_default(),
                snippet: snippets.build(&parsed.indexable_text()),
                relevance: candidate.absolute / max,
            });
        }

        debug!(
            "Query {:?}: {} matches, returning {}",
            query.text,
            count,
            items.len()
        );
        Ok(SearchResults { count, items })
    }

    /// Sites searched by a query, keyed by site ID
    fn sites_in_scope(
        &self,
        storage: &SqliteStorage,
        filter: Option<&str>,
    ) -> Result<HashMap<i64, SiteRecord>> {
        let sites = storage.list_sites()?;

        let Some(filter) = filter else {
            return Ok(sites.into_iter().map(|site| (site.id, site)).collect());
        };

        let configured = self
            .scope
            .find_by_root(filter)
            .ok_or_else(|| SearchError::OutOfScope {
                url: filter.to_string(),
            })?;
        Ok(sites
            .into_iter()
            .filter(|site| site.url == configured.url)
            .map(|site| (site.id, site))
            .collect())
    }

    /// Ranks the pages containing every query lemma, best first
    ///
    /// Returns None when some lemma occurs on no page in scope.
    fn rank(
        &self,
        storage: &SqliteStorage,
        lemmas: &HashSet<String>,
        site_ids: &[i64],
    ) -> Result<Option<Vec<Ranked>>> {
        let mut query_lemmas = Vec::with_capacity(lemmas.len());
        for lemma in lemmas {
            let frequency = storage.lemma_frequency(lemma, site_ids)?;
            if frequency == 0 {
                return Ok(None);
            }
            query_lemmas.push(QueryLemma {
                lemma: lemma.clone(),
                frequency,
            });
        }
        query_lemmas.sort_by(|a, b| {
            a.frequency
                .cmp(&b.frequency)
                .then_with(|| a.lemma.cmp(&b.lemma))
        });

        let total_pages = storage.count_pages(site_ids)?.max(1) as f64;
        let cutoff = self.config.frequency_cutoff;
        let mut ranking: Vec<bool> = query_lemmas
            .iter()
            .map(|q| q.frequency as f64 / total_pages <= cutoff)
            .collect();
        if !ranking.iter().any(|r| *r) {
            ranking.iter_mut().for_each(|r| *r = true);
        }

        let mut scores: HashMap<i64, f64> = HashMap::new();
        for (i, (query_lemma, ranks)) in query_lemmas.iter().zip(&ranking).enumerate() {
            let weights = storage.lemma_weights(&query_lemma.lemma, site_ids)?;

            if i == 0 {
                scores = weights.keys().map(|page_id| (*page_id, 0.0)).collect();
            } else {
                scores.retain(|page_id, _| weights.contains_key(page_id));
            }
            if *ranks {
                for (page_id, score) in scores.iter_mut() {
                    *score += weights.get(page_id).copied().unwrap_or(0.0);
                }
            }
            if scores.is_empty() {
                break;
            }
        }

        let mut ranked: Vec<Ranked> = scores
            .into_iter()
            .map(|(page_id, absolute)| Ranked { page_id, absolute })
            .collect();
        ranked.sort_by(|a, b| {
            b.absolute
                .partial_cmp(&a.absolute)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.page_id.cmp(&b.page_id))
        });

        Ok(Some(ranked))
    }
}
