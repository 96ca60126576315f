//! Per-site crawl worker
//!
//! A worker owns one site's frontier for the duration of a run:
//! fetch -> store and index -> enqueue unseen same-site links, until the
//! frontier is empty, the run is cancelled, or the site fails.

use crate::crawler::fetcher::{FetchError, PageFetcher, Transport};
use crate::crawler::indexer::PageIndexer;
use crate::state::SiteStatus;
use crate::storage::{self, SharedStorage, Storage};
use crate::url::{is_page_candidate, page_path, ScopedSite};
use crate::SearchError;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

/// How a worker's crawl ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Frontier exhausted; site marked INDEXED
    Indexed { pages: usize },

    /// Run cancelled; site status left as it was
    Cancelled { pages: usize },

    /// Site marked FAILED with this message
    Failed { pages: usize, error: String },
}

/// Crawls one configured site
pub struct SiteWorker<T: Transport> {
    site: ScopedSite,
    site_id: i64,
    fetcher: Arc<PageFetcher<T>>,
    indexer: PageIndexer,
    storage: SharedStorage,
    token: CancellationToken,
}

impl<T: Transport> SiteWorker<T> {
    pub fn new(
        site: ScopedSite,
        site_id: i64,
        fetcher: Arc<PageFetcher<T>>,
        indexer: PageIndexer,
        storage: SharedStorage,
        token: CancellationToken,
    ) -> Self {
        Self {
            site,
            site_id,
            fetcher,
            indexer,
            storage,
            token,
        }
    }

    pub fn site_id(&self) -> i64 {
        self.site_id
    }

    /// Runs the crawl to completion and records the final site status
    pub async fn run(self) -> WorkerOutcome {
        info!("Crawling site {} ({})", self.site.name, self.site.url);

        let mut pages = 0;
        let result = self.crawl(&mut pages).await;

        let outcome = match result {
            Ok(true) => WorkerOutcome::Indexed { pages },
            Ok(false) => WorkerOutcome::Cancelled { pages },
            Err(SearchError::Fetch(e @ FetchError::ConnectionFailed { .. })) => {
                WorkerOutcome::Failed {
                    pages,
                    error: e.to_string(),
                }
            }
            Err(e) => {
                let error = e.to_string();
                self.set_status(SiteStatus::Failed, Some(&error));
                WorkerOutcome::Failed { pages, error }
            }
        };

        match &outcome {
            WorkerOutcome::Indexed { pages } => {
                self.set_status(SiteStatus::Indexed, None);
                info!("Site {} indexed ({} pages)", self.site.url, pages);
            }
            WorkerOutcome::Cancelled { pages } => {
                info!("Crawl of {} stopped after {} pages", self.site.url, pages);
            }
            WorkerOutcome::Failed { error, .. } => {
                error!("Crawl of {} failed: {}", self.site.url, error);
            }
        }

        outcome
    }

    /// Returns Ok(true) when the frontier was exhausted, Ok(false) when cancelled
    async fn crawl(&self, pages: &mut usize) -> Result<bool, SearchError> {
        let mut frontier = VecDeque::from([self.site.root.clone()]);
        let mut seen = HashSet::from([page_path(&self.site.root)]);

        while let Some(url) = frontier.pop_front() {
            if self.token.is_cancelled() {
                return Ok(false);
            }

            let page = match self.fetcher.fetch(&url, self.site_id, Some(&self.token)).await {
                Ok(page) => page,
                Err(FetchError::UnsupportedContent { url, content_type }) => {
                    debug!("Skipping {} ({})", url, content_type);
                    continue;
                }
                Err(FetchError::Cancelled { .. }) => return Ok(false),
                Err(e) => return Err(e.into()),
            };

            let indexed = self.indexer.index(self.site_id, &page)?;
            *pages += 1;
            storage::lock(&self.storage)?.touch_site(self.site_id)?;

            for link in indexed.links {
                if self.enqueue(&link, &mut seen) {
                    frontier.push_back(link);
                }
            }
        }

        Ok(true)
    }

    /// Returns true if the link is an unseen page of this site
    fn enqueue(&self, link: &Url, seen: &mut HashSet<String>) -> bool {
        self.site.contains(link) && is_page_candidate(link) && seen.insert(page_path(link))
    }

    fn set_status(&self, status: SiteStatus, error: Option<&str>) {
        let result = storage::lock(&self.storage).and_then(|mut storage| {
            storage
                .update_site_status(self.site_id, status, error)
                .map_err(Into::into)
        });
        if let Err(e) = result {
            error!("Could not set status of {} to {}: {}", self.site.url, status, e);
        }
    }
}
