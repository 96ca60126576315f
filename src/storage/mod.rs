//! Storage module for persisting sites, pages and the inverted index
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Site status persistence
//! - Atomic page replacement with lemma frequency bookkeeping
//! - Index lookups for the query engine
//! - Frequency verification and repair

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::SiteStatus;
use crate::SearchError;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage shared between workers, the orchestrator and the query engine
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(SearchError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SearchError> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing
pub fn share(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage, mapping a poisoned lock to an error
pub fn lock(storage: &SharedStorage) -> Result<MutexGuard<'_, SqliteStorage>, SearchError> {
    storage
        .lock()
        .map_err(|_| SearchError::LockPoisoned("storage"))
}

/// Represents a site in the database
#[derive(Debug, Clone)]
pub struct SiteRecord {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    pub status_time: String,
    pub last_error: Option<String>,
}

/// Represents a page in the database
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    pub path: String,
    pub code: u16,
    pub content: String,
}

/// A page about to be stored
#[derive(Debug, Clone, Copy)]
pub struct NewPage<'a> {
    pub path: &'a str,
    pub code: u16,
    pub content: &'a str,
}

/// Page and lemma counts of one site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteCounts {
    pub pages: u64,
    pub lemmas: u64,
}

/// A lemma whose stored frequency disagrees with its index entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyMismatch {
    pub site_id: i64,
    pub lemma: String,
    pub stored: i64,
    pub actual: i64,
}
