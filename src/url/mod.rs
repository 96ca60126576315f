//! URL handling module for lemma-search
//!
//! This module provides URL normalization, page-path derivation, and the
//! site scope used to decide which configured site a URL belongs to.

mod normalize;
mod scope;

use crate::UrlError;
use url::Url;

// Re-export main functions
pub use normalize::{normalize_url, page_path};
pub use scope::{is_page_candidate, ScopedSite, SiteScope};

/// Computes the key two URLs must share to belong to the same site
///
/// The key is the lowercase host without a leading `www.`, followed by the
/// port when one is given explicitly. The scheme is ignored so that `http`
/// and `https` links to the same host stay on one site.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use lemma_search::url::site_key;
///
/// let url = Url::parse("https://WWW.Example.com/path").unwrap();
/// assert_eq!(site_key(&url).unwrap(), "example.com");
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(site_key(&url).unwrap(), "127.0.0.1:8080");
/// ```
pub fn site_key(url: &Url) -> Result<String, UrlError> {
    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
