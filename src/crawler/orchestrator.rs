//! Crawl orchestration
//!
//! The orchestrator owns the run state: it spawns one supervised worker per
//! configured site, propagates the stop signal, and serializes single-page
//! re-indexing against crawl runs.

use crate::config::Config;
use crate::crawler::fetcher::{FetchError, PageFetcher, Transport};
use crate::crawler::indexer::{IndexedPage, PageIndexer};
use crate::crawler::worker::SiteWorker;
use crate::lemma::Lemmatizer;
use crate::state::{RunPhase, SiteStatus};
use crate::storage::{self, SharedStorage, Storage};
use crate::url::{normalize_url, page_path, ScopedSite, SiteScope};
use crate::{Result, SearchError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Error stored on a site whose worker panicked
const WORKER_PANIC_MESSAGE: &str = "Indexing worker terminated unexpectedly";

/// Mutable state guarded by the orchestrator's lock
struct RunControl {
    phase: RunPhase,
    token: Option<CancellationToken>,
    workers: Vec<JoinHandle<()>>,

    /// URLs of single-page re-index jobs in flight
    page_jobs: HashSet<String>,
}

impl RunControl {
    fn workers_active(&self) -> bool {
        self.workers.iter().any(|worker| !worker.is_finished())
    }

    fn is_running(&self) -> bool {
        self.phase.is_running(self.workers_active())
    }
}

/// Removes a page job from the in-flight set when dropped
struct PageJob<'a> {
    control: &'a Mutex<RunControl>,
    url: String,
}

impl Drop for PageJob<'_> {
    fn drop(&mut self) {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .page_jobs
            .remove(&self.url);
    }
}

/// Runs crawls over every configured site
pub struct Orchestrator<T: Transport> {
    scope: Arc<SiteScope>,
    storage: SharedStorage,
    fetcher: Arc<PageFetcher<T>>,
    indexer: PageIndexer,
    control: Arc<Mutex<RunControl>>,
}

impl<T: Transport> Orchestrator<T> {
    /// Creates an idle orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration (sites and connection settings)
    /// * `storage` - Shared index store
    /// * `transport` - Transport used for every request
    /// * `lemmatizer` - Lemmatizer shared with the query engine
    pub fn new(
        config: &Config,
        storage: SharedStorage,
        transport: T,
        lemmatizer: Arc<Lemmatizer>,
    ) -> Result<Self> {
        let scope = Arc::new(SiteScope::from_config(config)?);
        let fetcher = Arc::new(PageFetcher::new(
            transport,
            storage.clone(),
            &config.connection,
        ));
        let indexer = PageIndexer::new(storage.clone(), lemmatizer);

        Ok(Self {
            scope,
            storage,
            fetcher,
            indexer,
            control: Arc::new(Mutex::new(RunControl {
                phase: RunPhase::Idle,
                token: None,
                workers: Vec::new(),
                page_jobs: HashSet::new(),
            })),
        })
    }

    /// The configured sites
    pub fn scope(&self) -> &Arc<SiteScope> {
        &self.scope
    }

    fn lock_control(&self) -> Result<MutexGuard<'_, RunControl>> {
        self.control
            .lock()
            .map_err(|_| SearchError::LockPoisoned("run state"))
    }

    /// Starts crawling every configured site
    ///
    /// Each site row is reset to INDEXING and its previous pages, lemmas and
    /// index entries are cleared before its worker is spawned. Returns as
    /// soon as the workers are spawned.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Workers spawned
    /// * `Err(SearchError::AlreadyRunning)` - A run or page re-index is active
    /// * `Err(SearchError::NoRuntime)` - Called outside a Tokio runtime
    pub fn start_indexing(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| SearchError::NoRuntime)?;

        let mut control = self.lock_control()?;
        if !control.phase.can_start(control.workers_active()) || !control.page_jobs.is_empty() {
            return Err(SearchError::AlreadyRunning);
        }

        let site_ids = self.prepare_sites()?;

        let token = CancellationToken::new();
        let workers = self
            .scope
            .sites()
            .iter()
            .zip(site_ids)
            .map(|(site, site_id)| {
                let worker = SiteWorker::new(
                    site.clone(),
                    site_id,
                    self.fetcher.clone(),
                    self.indexer.clone(),
                    self.storage.clone(),
                    token.clone(),
                );
                handle.spawn(supervise(worker, self.storage.clone(), site.url.clone()))
            })
            .collect();

        control.phase = RunPhase::Running;
        control.token = Some(token);
        control.workers = workers;

        info!("Indexing started for {} sites", self.scope.sites().len());
        Ok(())
    }

    /// Resets every configured site for a new run, in configuration order
    fn prepare_sites(&self) -> Result<Vec<i64>> {
        let mut storage = storage::lock(&self.storage)?;
        let mut site_ids = Vec::with_capacity(self.scope.sites().len());

        for site in self.scope.sites() {
            let site_id = storage.upsert_site(&site.url, &site.name, SiteStatus::Indexing)?;
            storage.clear_site(site_id)?;
            site_ids.push(site_id);
        }

        Ok(site_ids)
    }

    /// Cancels the active run and waits for every worker to exit
    ///
    /// The workers are drained by a separate task that returns the run state
    /// to idle, so dropping this future does not leave the run stopping.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - All workers exited
    /// * `Err(SearchError::NotRunning)` - No worker was active
    /// * `Err(SearchError::NoRuntime)` - Called outside a Tokio runtime
    pub async fn stop_indexing(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| SearchError::NoRuntime)?;

        let drain = {
            let mut control = self.lock_control()?;
            if !control.phase.can_stop(control.workers_active()) {
                return Err(SearchError::NotRunning);
            }
            control.phase = RunPhase::Stopping;
            if let Some(token) = control.token.take() {
                token.cancel();
            }
            let workers = std::mem::take(&mut control.workers);
            handle.spawn(drain_workers(workers, self.control.clone()))
        };

        if let Err(e) = drain.await {
            warn!("Stop task ended abnormally: {}", e);
        }
        Ok(())
    }

    /// True while any worker is active or a stop is draining
    pub fn is_running(&self) -> bool {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_running()
    }

    /// Re-indexes one page of a configured site
    ///
    /// The page is fetched without politeness delay and its stored data is
    /// replaced atomically. A site row is created if the site was never
    /// crawled.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexedPage)` - The page was stored
    /// * `Err(SearchError::OutOfScope)` - The URL is not on a configured site
    /// * `Err(SearchError::AlreadyRunning)` - A crawl run is active
    /// * `Err(SearchError::PageBusy)` - The same page is already being re-indexed
    /// * `Err(SearchError::Fetch)` - The page could not be fetched
    pub async fn index_page(&self, url: &str) -> Result<IndexedPage> {
        let (site, url) = self.resolve(url)?;
        let job_url = url.to_string();

        let _job = {
            let mut control = self.lock_control()?;
            if control.is_running() {
                return Err(SearchError::AlreadyRunning);
            }
            if !control.page_jobs.insert(job_url.clone()) {
                return Err(SearchError::PageBusy { url: job_url });
            }
            PageJob {
                control: &*self.control,
                url: job_url,
            }
        };

        let (site_id, created) = {
            let mut storage = storage::lock(&self.storage)?;
            let existing = storage.get_site_by_url(&site.url)?;
            match existing {
                Some(record) => (record.id, false),
                None => (
                    storage.upsert_site(&site.url, &site.name, SiteStatus::Indexing)?,
                    true,
                ),
            }
        };

        let fetched = self.fetcher.fetch(&url, site_id, None).await;
        let result = match fetched {
            Ok(page) => self.indexer.index(site_id, &page),
            Err(e) => Err(e.into()),
        };

        let skipped = matches!(
            result,
            Err(SearchError::Fetch(FetchError::UnsupportedContent { .. }))
        );
        if created && (result.is_ok() || skipped) {
            storage::lock(&self.storage)?.update_site_status(site_id, SiteStatus::Indexed, None)?;
        }

        if let Ok(indexed) = &result {
            info!("Re-indexed {}{} ({} lemmas)", site.url, indexed.path, indexed.lemma_count);
        }
        result
    }

    /// Removes one page and its index data
    ///
    /// Returns false if the page was never stored.
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - Whether a stored page was removed
    /// * `Err(SearchError::OutOfScope)` - The URL is not on a configured site
    /// * `Err(SearchError::AlreadyRunning)` - A crawl run is active
    /// * `Err(SearchError::PageBusy)` - The page is being re-indexed
    pub fn delete_page(&self, url: &str) -> Result<bool> {
        let (site, url) = self.resolve(url)?;

        // Held until the delete commits so no crawl or re-index can start meanwhile
        let control = self.lock_control()?;
        if control.is_running() {
            return Err(SearchError::AlreadyRunning);
        }
        if control.page_jobs.contains(url.as_str()) {
            return Err(SearchError::PageBusy {
                url: url.to_string(),
            });
        }

        let mut storage = storage::lock(&self.storage)?;
        let Some(record) = storage.get_site_by_url(&site.url)? else {
            return Ok(false);
        };
        let path = page_path(&url);
        let Some(page) = storage.get_page_by_path(record.id, &path)? else {
            return Ok(false);
        };

        storage.delete_page(record.id, &path)?;
        drop(storage);
        drop(control);

        info!("Removed {}{} (last status {})", site.url, path, page.code);
        Ok(true)
    }

    /// Normalizes a URL and finds the configured site it belongs to
    fn resolve(&self, url: &str) -> Result<(ScopedSite, url::Url)> {
        let out_of_scope = || SearchError::OutOfScope {
            url: url.to_string(),
        };

        let normalized = normalize_url(url).map_err(|_| out_of_scope())?;
        let site = self.scope.find(&normalized).ok_or_else(out_of_scope)?;
        Ok((site.clone(), normalized))
    }
}

impl<T: Transport> Drop for Orchestrator<T> {
    fn drop(&mut self) {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = control.token.take() {
            token.cancel();
        }
    }
}

/// Waits for cancelled workers, then returns the run state to idle
async fn drain_workers(workers: Vec<JoinHandle<()>>, control: Arc<Mutex<RunControl>>) {
    info!("Stopping indexing; waiting for {} workers", workers.len());
    for worker in workers {
        if let Err(e) = worker.await {
            warn!("Supervisor task ended abnormally: {}", e);
        }
    }

    control.lock().unwrap_or_else(PoisonError::into_inner).phase = RunPhase::Idle;
    info!("Indexing stopped");
}

/// Runs a worker in its own task and contains a panic
async fn supervise<T: Transport>(worker: SiteWorker<T>, storage: SharedStorage, url: String) {
    let site_id = worker.site_id();

    let Err(e) = tokio::spawn(worker.run()).await else {
        return;
    };

    if e.is_panic() {
        error!("Crawl worker for {} panicked", url);
        let result = storage::lock(&storage).and_then(|mut storage| {
            storage
                .update_site_status(site_id, SiteStatus::Failed, Some(WORKER_PANIC_MESSAGE))
                .map_err(Into::into)
        });
        if let Err(e) = result {
            error!("Could not mark {} as failed: {}", url, e);
        }
    }
}
