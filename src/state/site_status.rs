/// Site status definitions for tracking indexing progress
///
/// A site moves `INDEXING -> INDEXED` when its crawl finishes, or
/// `INDEXING -> FAILED` when a page cannot be fetched or stored.
use std::fmt;

/// Represents the indexing status of a configured site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteStatus {
    /// A crawl of this site is in progress (or was stopped midway)
    Indexing,

    /// The site's frontier was exhausted without a fatal error
    Indexed,

    /// The crawl ended on a connection or storage failure
    Failed,
}

impl SiteStatus {
    /// Returns true if no worker will change this status any more
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Indexed | Self::Failed)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Indexing => "INDEXING",
            Self::Indexed => "INDEXED",
            Self::Failed => "FAILED",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "INDEXING" => Some(Self::Indexing),
            "INDEXED" => Some(Self::Indexed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible site statuses
    pub fn all_statuses() -> [Self; 3] {
        [Self::Indexing, Self::Indexed, Self::Failed]
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
