//! Statistics generation from the index database
//!
//! This module provides functionality for extracting and displaying
//! indexing statistics from the storage layer.

use crate::state::SiteStatus;
use crate::storage::{SiteCounts, Storage};
use crate::url::SiteScope;
use crate::Result;

/// Totals over every configured site
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TotalStatistics {
    /// Number of configured sites
    pub sites: usize,

    /// Pages stored across all sites
    pub pages: u64,

    /// Lemma rows across all sites
    pub lemmas: u64,

    /// Whether a crawl run is active
    pub indexing: bool,
}

/// Statistics for one configured site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteStatistics {
    pub url: String,
    pub name: String,

    /// None if the site was never crawled
    pub status: Option<SiteStatus>,
    pub status_time: Option<String>,
    pub error: Option<String>,
    pub pages: u64,
    pub lemmas: u64,
}

/// Aggregate and per-site indexing statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub total: TotalStatistics,

    /// One entry per configured site, in configuration order
    pub detailed: Vec<SiteStatistics>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `scope` - The configured sites
/// * `indexing` - Whether a crawl run is currently active
///
/// # Returns
///
/// * `Ok(Statistics)` - Successfully loaded statistics
/// * `Err(SearchError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    scope: &SiteScope,
    indexing: bool,
) -> Result<Statistics> {
    let mut total = TotalStatistics {
        sites: scope.sites().len(),
        indexing,
        ..TotalStatistics::default()
    };
    let mut detailed = Vec::with_capacity(scope.sites().len());

    for site in scope.sites() {
        let record = storage.get_site_by_url(&site.url)?;
        let counts = match &record {
            Some(record) => storage.site_counts(record.id)?,
            None => SiteCounts::default(),
        };

        total.pages += counts.pages;
        total.lemmas += counts.lemmas;

        detailed.push(SiteStatistics {
            url: site.url.clone(),
            name: site.name.clone(),
            status: record.as_ref().map(|r| r.status),
            status_time: record.as_ref().map(|r| r.status_time.clone()),
            error: record.and_then(|r| r.last_error),
            pages: counts.pages,
            lemmas: counts.lemmas,
        });
    }

    Ok(Statistics { total, detailed })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &Statistics) {
    println!("=== Index Statistics ===\n");

    println!("Overview:");
    println!("  Sites: {}", stats.total.sites);
    println!("  Pages: {}", stats.total.pages);
    println!("  Lemmas: {}", stats.total.lemmas);
    println!(
        "  Indexing: {}",
        if stats.total.indexing { "running" } else { "idle" }
    );
    println!();

    println!("Sites:");
    for site in &stats.detailed {
        let status = site
            .status
            .map_or_else(|| "NOT INDEXED".to_string(), |s| s.to_string());
        println!("  {} ({})", site.name, site.url);
        println!("    Status: {}", status);
        if let Some(time) = &site.status_time {
            println!("    Status time: {}", time);
        }
        println!("    Pages: {}, lemmas: {}", site.pages, site.lemmas);
        if let Some(error) = &site.error {
            println!("    Last error: {}", error);
        }
    }
}
