//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::SiteStatus;
use crate::storage::{FrequencyMismatch, NewPage, PageRecord, SiteCounts, SiteRecord};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Site not found: {0}")]
    SiteNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every method that changes a page's index data runs in a single
/// transaction, so `lemma.frequency` always equals the number of the site's
/// pages that have an index entry for that lemma.
pub trait Storage {
    // ===== Site Management =====

    /// Creates a site row, or resets an existing one
    ///
    /// # Arguments
    ///
    /// * `url` - The site's root URL as configured
    /// * `name` - Display name
    /// * `status` - Initial status; the last error is cleared
    ///
    /// # Returns
    ///
    /// The site ID
    fn upsert_site(&mut self, url: &str, name: &str, status: SiteStatus) -> StorageResult<i64>;

    /// Sets a site's status, status time and last error
    fn update_site_status(
        &mut self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()>;

    /// Refreshes a site's status time without changing its status
    fn touch_site(&mut self, site_id: i64) -> StorageResult<()>;

    /// Gets a site by its root URL
    fn get_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>>;

    /// Gets all sites, ordered by ID
    fn list_sites(&self) -> StorageResult<Vec<SiteRecord>>;

    /// Deletes all pages, lemmas and index entries of a site
    fn clear_site(&mut self, site_id: i64) -> StorageResult<()>;

    // ===== Page Management =====

    /// Stores a page and replaces its index data
    ///
    /// Old index entries of the page are removed and their lemma frequencies
    /// decremented before the new ones are inserted, all in one transaction.
    ///
    /// # Arguments
    ///
    /// * `site_id` - The owning site
    /// * `page` - Path, status code and content
    /// * `lemmas` - Lemma counts of the page's text (empty for error pages)
    ///
    /// # Returns
    ///
    /// The page ID (unchanged if the page already existed)
    fn save_page(
        &mut self,
        site_id: i64,
        page: &NewPage<'_>,
        lemmas: &HashMap<String, u32>,
    ) -> StorageResult<i64>;

    /// Deletes a page and its index data
    ///
    /// Returns false if the page did not exist.
    fn delete_page(&mut self, site_id: i64, path: &str) -> StorageResult<bool>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<Option<PageRecord>>;

    /// Gets a page by its site and path
    fn get_page_by_path(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>>;

    // ===== Index Queries =====

    /// Counts the pages of the given sites
    fn count_pages(&self, site_ids: &[i64]) -> StorageResult<u64>;

    /// Sums a lemma's frequency over the given sites
    fn lemma_frequency(&self, lemma: &str, site_ids: &[i64]) -> StorageResult<u64>;

    /// Gets the index weight of a lemma for every page of the given sites that contains it
    ///
    /// # Returns
    ///
    /// A map from page ID to weight
    fn lemma_weights(&self, lemma: &str, site_ids: &[i64]) -> StorageResult<HashMap<i64, f64>>;

    // ===== Statistics =====

    /// Counts a site's pages and lemmas
    fn site_counts(&self, site_id: i64) -> StorageResult<SiteCounts>;

    // ===== Verification =====

    /// Finds lemmas whose stored frequency disagrees with their index entries
    fn lemma_frequency_mismatches(&self) -> StorageResult<Vec<FrequencyMismatch>>;

    /// Recomputes every lemma frequency from the index entries
    ///
    /// Lemmas left with no entries are deleted.
    ///
    /// # Returns
    ///
    /// The number of lemma rows that were corrected
    fn repair_lemma_frequencies(&mut self) -> StorageResult<u64>;
}
