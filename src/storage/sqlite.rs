//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::SiteStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{FrequencyMismatch, NewPage, PageRecord, SiteCounts, SiteRecord};
use crate::SearchError;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SearchError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SearchError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, SearchError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Builds `?first, ?first+1, ...` for an `IN (...)` list
fn placeholders(count: usize, first: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Arguments for a lemma query restricted to a set of sites
fn lemma_args(lemma: &str, site_ids: &[i64]) -> Vec<Value> {
    std::iter::once(Value::Text(lemma.to_string()))
        .chain(site_ids.iter().map(|id| Value::Integer(*id)))
        .collect()
}

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<SiteRecord> {
    let status: String = row.get(3)?;
    Ok(SiteRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        status: SiteStatus::from_db_string(&status).unwrap_or(SiteStatus::Failed),
        status_time: row.get(4)?,
        last_error: row.get(5)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        path: row.get(2)?,
        code: row.get(3)?,
        content: row.get(4)?,
    })
}

/// Removes a page's index entries and decrements the lemmas they counted
fn remove_page_index(conn: &Connection, site_id: i64, page_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE lemma SET frequency = frequency - 1
         WHERE id IN (SELECT lemma_id FROM search_index WHERE page_id = ?1)",
        params![page_id],
    )?;
    conn.execute(
        "DELETE FROM search_index WHERE page_id = ?1",
        params![page_id],
    )?;
    conn.execute(
        "DELETE FROM lemma WHERE site_id = ?1 AND frequency <= 0",
        params![site_id],
    )?;
    Ok(())
}

const SITE_COLUMNS: &str = "id, url, name, status, status_time, last_error";
const PAGE_COLUMNS: &str = "id, site_id, path, code, content";

impl Storage for SqliteStorage {
    // ===== Site Management =====

    fn upsert_site(&mut self, url: &str, name: &str, status: SiteStatus) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO site (url, name, status, status_time, last_error)
             VALUES (?1, ?2, ?3, ?4, NULL)
             ON CONFLICT(url) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                status_time = excluded.status_time,
                last_error = NULL",
            params![url, name, status.to_db_string(), now()],
        )?;

        let id = self
            .conn
            .query_row("SELECT id FROM site WHERE url = ?1", params![url], |row| {
                row.get(0)
            })?;
        Ok(id)
    }

    fn update_site_status(
        &mut self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE site SET status = ?1, status_time = ?2, last_error = ?3 WHERE id = ?4",
            params![status.to_db_string(), now(), last_error, site_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SiteNotFound(site_id));
        }
        Ok(())
    }

    fn touch_site(&mut self, site_id: i64) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE site SET status_time = ?1 WHERE id = ?2",
            params![now(), site_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SiteNotFound(site_id));
        }
        Ok(())
    }

    fn get_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>> {
        let site = self
            .conn
            .query_row(
                &format!("SELECT {} FROM site WHERE url = ?1", SITE_COLUMNS),
                params![url],
                site_from_row,
            )
            .optional()?;
        Ok(site)
    }

    fn list_sites(&self) -> StorageResult<Vec<SiteRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM site ORDER BY id", SITE_COLUMNS))?;
        let sites = stmt
            .query_map([], site_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    fn clear_site(&mut self, site_id: i64) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM search_index WHERE page_id IN (SELECT id FROM page WHERE site_id = ?1)",
            params![site_id],
        )?;
        tx.execute("DELETE FROM page WHERE site_id = ?1", params![site_id])?;
        tx.execute("DELETE FROM lemma WHERE site_id = ?1", params![site_id])?;
        tx.commit()?;
        Ok(())
    }

    // ===== Page Management =====

    fn save_page(
        &mut self,
        site_id: i64,
        page: &NewPage<'_>,
        lemmas: &HashMap<String, u32>,
    ) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM page WHERE site_id = ?1 AND path = ?2",
                params![site_id, page.path],
                |row| row.get(0),
            )
            .optional()?;

        let page_id = match existing {
            Some(id) => {
                remove_page_index(&tx, site_id, id)?;
                tx.execute(
                    "UPDATE page SET code = ?1, content = ?2 WHERE id = ?3",
                    params![page.code, page.content, id],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO page (site_id, path, code, content) VALUES (?1, ?2, ?3, ?4)",
                    params![site_id, page.path, page.code, page.content],
                )?;
                tx.last_insert_rowid()
            }
        };

        {
            let mut upsert_lemma = tx.prepare_cached(
                "INSERT INTO lemma (site_id, lemma, frequency) VALUES (?1, ?2, 1)
                 ON CONFLICT(site_id, lemma) DO UPDATE SET frequency = frequency + 1",
            )?;
            let mut lemma_id = tx.prepare_cached(
                "SELECT id FROM lemma WHERE site_id = ?1 AND lemma = ?2",
            )?;
            let mut insert_entry = tx.prepare_cached(
                "INSERT INTO search_index (page_id, lemma_id, rank) VALUES (?1, ?2, ?3)",
            )?;

            for (lemma, count) in lemmas.iter().filter(|(_, count)| **count > 0) {
                upsert_lemma.execute(params![site_id, lemma])?;
                let id: i64 = lemma_id.query_row(params![site_id, lemma], |row| row.get(0))?;
                insert_entry.execute(params![page_id, id, f64::from(*count)])?;
            }
        }

        tx.commit()?;
        Ok(page_id)
    }

    fn delete_page(&mut self, site_id: i64, path: &str) -> StorageResult<bool> {
        let tx = self.conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM page WHERE site_id = ?1 AND path = ?2",
                params![site_id, path],
                |row| row.get(0),
            )
            .optional()?;

        let Some(page_id) = existing else {
            return Ok(false);
        };

        remove_page_index(&tx, site_id, page_id)?;
        tx.execute("DELETE FROM page WHERE id = ?1", params![page_id])?;
        tx.commit()?;
        Ok(true)
    }

    fn get_page(&self, page_id: i64) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                &format!("SELECT {} FROM page WHERE id = ?1", PAGE_COLUMNS),
                params![page_id],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn get_page_by_path(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM page WHERE site_id = ?1 AND path = ?2",
                    PAGE_COLUMNS
                ),
                params![site_id, path],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    // ===== Index Queries =====

    fn count_pages(&self, site_ids: &[i64]) -> StorageResult<u64> {
        if site_ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "SELECT COUNT(*) FROM page WHERE site_id IN ({})",
            placeholders(site_ids.len(), 1)
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(site_ids.iter()), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn lemma_frequency(&self, lemma: &str, site_ids: &[i64]) -> StorageResult<u64> {
        if site_ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "SELECT COALESCE(SUM(frequency), 0) FROM lemma WHERE lemma = ?1 AND site_id IN ({})",
            placeholders(site_ids.len(), 2)
        );
        let frequency: i64 = self.conn.query_row(
            &sql,
            params_from_iter(lemma_args(lemma, site_ids)),
            |row| row.get(0),
        )?;
        Ok(frequency.max(0) as u64)
    }

    fn lemma_weights(&self, lemma: &str, site_ids: &[i64]) -> StorageResult<HashMap<i64, f64>> {
        if site_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT si.page_id, si.rank FROM search_index si
             JOIN lemma l ON l.id = si.lemma_id
             WHERE l.lemma = ?1 AND l.site_id IN ({})",
            placeholders(site_ids.len(), 2)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let weights = stmt
            .query_map(params_from_iter(lemma_args(lemma, site_ids)), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(weights)
    }

    // ===== Statistics =====

    fn site_counts(&self, site_id: i64) -> StorageResult<SiteCounts> {
        let pages: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM page WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;
        let lemmas: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM lemma WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;

        Ok(SiteCounts {
            pages: pages as u64,
            lemmas: lemmas as u64,
        })
    }

    // ===== Verification =====

    fn lemma_frequency_mismatches(&self) -> StorageResult<Vec<FrequencyMismatch>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.site_id, l.lemma, l.frequency, COUNT(si.id) AS actual
             FROM lemma l
             LEFT JOIN search_index si ON si.lemma_id = l.id
             GROUP BY l.id
             HAVING l.frequency != actual
             ORDER BY l.site_id, l.lemma",
        )?;

        let mismatches = stmt
            .query_map([], |row| {
                Ok(FrequencyMismatch {
                    site_id: row.get(0)?,
                    lemma: row.get(1)?,
                    stored: row.get(2)?,
                    actual: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(mismatches)
    }

    fn repair_lemma_frequencies(&mut self) -> StorageResult<u64> {
        let corrected = self.lemma_frequency_mismatches()?.len() as u64;

        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE lemma SET frequency =
                (SELECT COUNT(*) FROM search_index si WHERE si.lemma_id = lemma.id)",
            [],
        )?;
        tx.execute("DELETE FROM lemma WHERE frequency <= 0", [])?;
        tx.commit()?;

        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lemmas(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs
            .iter()
            .map(|(lemma, count)| (lemma.to_string(), *count))
            .collect()
    }

    fn page<'a>(path: &'a str, content: &'a str) -> NewPage<'a> {
        NewPage {
            path,
            code: 200,
            content,
        }
    }

    fn storage_with_site() -> (SqliteStorage, i64) {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let site_id = storage
            .upsert_site("https://example.com", "Example", SiteStatus::Indexing)
            .unwrap();
        (storage, site_id)
    }

    #[test]
    fn test_upsert_site_resets_status() {
        let (mut storage, site_id) = storage_with_site();
        storage
            .update_site_status(site_id, SiteStatus::Failed, Some("boom"))
            .unwrap();

        let again = storage
            .upsert_site("https://example.com", "Renamed", SiteStatus::Indexing)
            .unwrap();
        assert_eq!(again, site_id);

        let site = storage
            .get_site_by_url("https://example.com")
            .unwrap()
            .unwrap();
        assert_eq!(site.name, "Renamed");
        assert_eq!(site.status, SiteStatus::Indexing);
        assert_eq!(site.last_error, None);
    }

    #[test]
    fn test_update_unknown_site() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let result = storage.update_site_status(42, SiteStatus::Indexed, None);
        assert!(matches!(result, Err(StorageError::SiteNotFound(42))));
    }

    #[test]
    fn test_save_page_counts_frequency() {
        let (mut storage, site_id) = storage_with_site();

        storage
            .save_page(site_id, &page("/a", "a"), &lemmas(&[("cat", 2), ("dog", 1)]))
            .unwrap();
        storage
            .save_page(site_id, &page("/b", "b"), &lemmas(&[("cat", 1)]))
            .unwrap();

        assert_eq!(storage.lemma_frequency("cat", &[site_id]).unwrap(), 2);
        assert_eq!(storage.lemma_frequency("dog", &[site_id]).unwrap(), 1);
        assert_eq!(storage.lemma_frequency("fish", &[site_id]).unwrap(), 0);
        assert_eq!(storage.count_pages(&[site_id]).unwrap(), 2);
        assert!(storage.lemma_frequency_mismatches().unwrap().is_empty());
    }

    #[test]
    fn test_replace_page_keeps_id_and_adjusts_frequency() {
        let (mut storage, site_id) = storage_with_site();

        let first = storage
            .save_page(site_id, &page("/a", "old"), &lemmas(&[("cat", 2), ("dog", 1)]))
            .unwrap();
        let second = storage
            .save_page(site_id, &page("/a", "new"), &lemmas(&[("cat", 5)]))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.count_pages(&[site_id]).unwrap(), 1);
        assert_eq!(storage.lemma_frequency("cat", &[site_id]).unwrap(), 1);
        assert_eq!(storage.lemma_frequency("dog", &[site_id]).unwrap(), 0);
        assert_eq!(storage.site_counts(site_id).unwrap().lemmas, 1);

        let weights = storage.lemma_weights("cat", &[site_id]).unwrap();
        assert_eq!(weights.get(&first), Some(&5.0));
        assert_eq!(
            storage.get_page(first).unwrap().unwrap().content,
            "new".to_string()
        );
        assert!(storage.lemma_frequency_mismatches().unwrap().is_empty());
    }

    #[test]
    fn test_delete_page_removes_index() {
        let (mut storage, site_id) = storage_with_site();
        storage
            .save_page(site_id, &page("/a", "a"), &lemmas(&[("cat", 1)]))
            .unwrap();
        storage
            .save_page(site_id, &page("/b", "b"), &lemmas(&[("cat", 1), ("dog", 3)]))
            .unwrap();

        assert!(storage.delete_page(site_id, "/b").unwrap());
        assert!(!storage.delete_page(site_id, "/b").unwrap());

        assert_eq!(storage.lemma_frequency("cat", &[site_id]).unwrap(), 1);
        assert_eq!(storage.lemma_frequency("dog", &[site_id]).unwrap(), 0);
        assert!(storage.get_page_by_path(site_id, "/b").unwrap().is_none());
        assert!(storage.lemma_frequency_mismatches().unwrap().is_empty());
    }

    #[test]
    fn test_clear_site_leaves_other_sites() {
        let (mut storage, site_a) = storage_with_site();
        let site_b = storage
            .upsert_site("https://other.org", "Other", SiteStatus::Indexing)
            .unwrap();

        storage
            .save_page(site_a, &page("/", "a"), &lemmas(&[("cat", 1)]))
            .unwrap();
        storage
            .save_page(site_b, &page("/", "b"), &lemmas(&[("cat", 1)]))
            .unwrap();

        storage.clear_site(site_a).unwrap();

        assert_eq!(storage.site_counts(site_a).unwrap(), SiteCounts::default());
        assert_eq!(
            storage.site_counts(site_b).unwrap(),
            SiteCounts { pages: 1, lemmas: 1 }
        );
        assert_eq!(storage.lemma_frequency("cat", &[site_a, site_b]).unwrap(), 1);
    }

    #[test]
    fn test_lemma_queries_respect_site_filter() {
        let (mut storage, site_a) = storage_with_site();
        let site_b = storage
            .upsert_site("https://other.org", "Other", SiteStatus::Indexing)
            .unwrap();

        let page_a = storage
            .save_page(site_a, &page("/", "a"), &lemmas(&[("cat", 3)]))
            .unwrap();
        let page_b = storage
            .save_page(site_b, &page("/", "b"), &lemmas(&[("cat", 1)]))
            .unwrap();

        assert_eq!(storage.lemma_frequency("cat", &[site_a, site_b]).unwrap(), 2);
        assert_eq!(storage.lemma_frequency("cat", &[site_b]).unwrap(), 1);
        assert_eq!(storage.lemma_frequency("cat", &[]).unwrap(), 0);

        let weights = storage.lemma_weights("cat", &[site_a, site_b]).unwrap();
        assert_eq!(weights.len(), 2);
        assert_eq!(weights[&page_a], 3.0);
        assert_eq!(weights[&page_b], 1.0);

        let only_b = storage.lemma_weights("cat", &[site_b]).unwrap();
        assert_eq!(only_b.keys().copied().collect::<Vec<_>>(), vec![page_b]);
    }

    #[test]
    fn test_error_page_stored_without_lemmas() {
        let (mut storage, site_id) = storage_with_site();
        let error_page = NewPage {
            path: "/missing",
            code: 404,
            content: "Not Found",
        };

        let id = storage
            .save_page(site_id, &error_page, &HashMap::new())
            .unwrap();

        let stored = storage.get_page(id).unwrap().unwrap();
        assert_eq!(stored.code, 404);
        assert_eq!(storage.site_counts(site_id).unwrap().lemmas, 0);
    }

    #[test]
    fn test_repair_lemma_frequencies() {
        let (mut storage, site_id) = storage_with_site();
        storage
            .save_page(site_id, &page("/a", "a"), &lemmas(&[("cat", 1), ("dog", 1)]))
            .unwrap();

        storage
            .conn
            .execute("UPDATE lemma SET frequency = 7 WHERE lemma = 'cat'", [])
            .unwrap();
        storage
            .conn
            .execute(
                "INSERT INTO lemma (site_id, lemma, frequency) VALUES (?1, 'ghost', 2)",
                params![site_id],
            )
            .unwrap();

        let mismatches = storage.lemma_frequency_mismatches().unwrap();
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].lemma, "cat");
        assert_eq!(mismatches[0].stored, 7);
        assert_eq!(mismatches[0].actual, 1);

        assert_eq!(storage.repair_lemma_frequencies().unwrap(), 2);
        assert!(storage.lemma_frequency_mismatches().unwrap().is_empty());
        assert_eq!(storage.lemma_frequency("cat", &[site_id]).unwrap(), 1);
        assert_eq!(storage.lemma_frequency("ghost", &[site_id]).unwrap(), 0);
    }

    #[test]
    fn test_list_sites_in_insert_order() {
        let (mut storage, _) = storage_with_site();
        storage
            .upsert_site("https://other.org", "Other", SiteStatus::Indexed)
            .unwrap();

        let sites = storage.list_sites().unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].url, "https://example.com");
        assert_eq!(sites[1].status, SiteStatus::Indexed);
    }
}
