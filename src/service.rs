//! Service facade
//!
//! `SearchService` wires the orchestrator, the query engine and the
//! statistics loader to one shared store, and applies request defaults.

use crate::config::Config;
use crate::crawler::{HttpTransport, IndexedPage, Orchestrator, Transport};
use crate::lemma::Lemmatizer;
use crate::search::{QueryEngine, SearchQuery, SearchResults};
use crate::stats::{load_statistics, Statistics};
use crate::storage::{self, FrequencyMismatch, SharedStorage, SqliteStorage, Storage};
use crate::{Result, SearchError};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// The crawl, index and search operations over one database
pub struct SearchService<T: Transport = HttpTransport> {
    config: Config,
    storage: SharedStorage,
    orchestrator: Orchestrator<T>,
    engine: QueryEngine,
}

impl SearchService<HttpTransport> {
    /// Opens the configured database and builds an HTTP transport
    pub fn new(config: Config) -> Result<Self> {
        let storage = storage::open_storage(Path::new(&config.output.database_path))?;
        let transport = HttpTransport::new(&config.connection)?;
        Self::with_parts(config, storage, transport)
    }
}

impl<T: Transport> SearchService<T> {
    /// Builds a service from an already opened store and a transport
    pub fn with_parts(config: Config, storage: SqliteStorage, transport: T) -> Result<Self> {
        let storage = storage::share(storage);
        let lemmatizer = Arc::new(Lemmatizer::new());

        let orchestrator =
            Orchestrator::new(&config, storage.clone(), transport, lemmatizer.clone())?;
        let engine = QueryEngine::new(
            storage.clone(),
            lemmatizer,
            orchestrator.scope().clone(),
            config.search.clone(),
        );

        Ok(Self {
            config,
            storage,
            orchestrator,
            engine,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts crawling every configured site; returns once workers are spawned
    pub fn start_indexing(&self) -> Result<()> {
        self.orchestrator.start_indexing()
    }

    /// Stops the active crawl and waits for its workers
    pub async fn stop_indexing(&self) -> Result<()> {
        self.orchestrator.stop_indexing().await
    }

    pub fn is_running(&self) -> bool {
        self.orchestrator.is_running()
    }

    /// Re-indexes one page of a configured site
    pub async fn index_page(&self, url: &str) -> Result<IndexedPage> {
        self.orchestrator.index_page(url).await
    }

    /// Removes one page and its index data
    pub fn delete_page(&self, url: &str) -> Result<bool> {
        self.orchestrator.delete_page(url)
    }

    /// Searches the index
    ///
    /// # Arguments
    ///
    /// * `query` - Query text
    /// * `site` - Root URL of one configured site, or None for all sites
    /// * `offset` - Results to skip; defaults to `search.default-offset`
    /// * `limit` - Results to return; defaults to `search.default-limit`
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResults)` - Total count and the requested window
    /// * `Err(SearchError::InvalidQuery)` - Blank query, negative offset or limit below 1
    /// * `Err(SearchError::OutOfScope)` - Unknown site
    pub fn search(
        &self,
        query: &str,
        site: Option<&str>,
        offset: Option<i64>,
        limit: Option<i64>,
    ) -> Result<SearchResults> {
        let offset = match offset {
            None => self.config.search.default_offset,
            Some(offset) => usize::try_from(offset).map_err(|_| {
                SearchError::InvalidQuery(format!("offset must be >= 0, got {}", offset))
            })?,
        };
        let limit = match limit {
            None => self.config.search.default_limit,
            Some(limit) if limit >= 1 => usize::try_from(limit).unwrap_or(usize::MAX),
            Some(limit) => {
                return Err(SearchError::InvalidQuery(format!(
                    "limit must be >= 1, got {}",
                    limit
                )))
            }
        };

        self.engine.search(&SearchQuery {
            text: query,
            site,
            offset,
            limit,
        })
    }

    /// Aggregate and per-site statistics
    pub fn get_statistics(&self) -> Result<Statistics> {
        let indexing = self.is_running();
        let storage = storage::lock(&self.storage)?;
        load_statistics(&*storage, self.orchestrator.scope(), indexing)
    }

    /// Lists lemmas whose frequency disagrees with their index entries
    pub fn verify(&self) -> Result<Vec<FrequencyMismatch>> {
        Ok(storage::lock(&self.storage)?.lemma_frequency_mismatches()?)
    }

    /// Rewrites every lemma frequency from the index entries
    pub fn repair(&self) -> Result<u64> {
        if self.is_running() {
            return Err(SearchError::AlreadyRunning);
        }
        let corrected = storage::lock(&self.storage)?.repair_lemma_frequencies()?;
        info!("Repaired {} lemma frequencies", corrected);
        Ok(corrected)
    }
}
