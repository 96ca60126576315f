use crate::config::{Config, SiteEntry};
use crate::url::{normalize_url, site_key};
use crate::UrlResult;
use url::Url;

/// File extensions that never lead to indexable HTML
const SKIPPED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp", "tif", "tiff", "pdf", "doc",
    "docx", "xls", "xlsx", "ppt", "pptx", "zip", "rar", "7z", "gz", "tar", "mp3", "mp4",
    "avi", "mov", "webm", "wav", "css", "js", "json", "xml", "exe", "dmg", "apk",
];

/// A configured site resolved for URL matching
#[derive(Debug, Clone)]
pub struct ScopedSite {
    /// Normalized root URL
    pub root: Url,

    /// Matching key (host without `www.`, plus explicit port)
    pub key: String,

    /// Root URL as written in the configuration
    pub url: String,

    /// Display name
    pub name: String,
}

impl ScopedSite {
    /// Builds a scoped site from its configuration entry
    pub fn from_entry(entry: &SiteEntry) -> UrlResult<Self> {
        let root = normalize_url(&entry.url)?;
        let key = site_key(&root)?;
        Ok(Self {
            root,
            key,
            url: entry.url.clone(),
            name: entry.name.clone(),
        })
    }

    /// Returns true if the URL belongs to this site
    pub fn contains(&self, url: &Url) -> bool {
        site_key(url).map(|key| key == self.key).unwrap_or(false)
    }
}

/// The set of configured sites, used to decide which site a URL belongs to
#[derive(Debug, Clone)]
pub struct SiteScope {
    sites: Vec<ScopedSite>,
}

impl SiteScope {
    /// Resolves every configured site
    pub fn from_config(config: &Config) -> UrlResult<Self> {
        let sites = config
            .sites
            .iter()
            .map(ScopedSite::from_entry)
            .collect::<UrlResult<Vec<_>>>()?;
        Ok(Self { sites })
    }

    /// Finds the configured site a URL belongs to
    pub fn find(&self, url: &Url) -> Option<&ScopedSite> {
        self.sites.iter().find(|site| site.contains(url))
    }

    /// Finds a configured site by its root URL (as given by a caller)
    pub fn find_by_root(&self, root: &str) -> Option<&ScopedSite> {
        let url = normalize_url(root).ok()?;
        self.find(&url)
    }

    /// All configured sites, in configuration order
    pub fn sites(&self) -> &[ScopedSite] {
        &self.sites
    }
}

/// Returns false for links to resources that are never HTML pages
///
/// ```
/// use lemma_search::url::is_page_candidate;
/// use url::Url;
///
/// assert!(is_page_candidate(&Url::parse("https://example.com/about").unwrap()));
/// assert!(!is_page_candidate(&Url::parse("https://example.com/logo.PNG").unwrap()));
/// ```
pub fn is_page_candidate(url: &Url) -> bool {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    match last_segment.rsplit_once('.') {
        Some((_, extension)) => !SKIPPED_EXTENSIONS.contains(&extension.to_lowercase().as_str()),
        None => true,
    }
}
