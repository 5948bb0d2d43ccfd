//! Pagination and page-level API payloads.

use serde::{Deserialize, Serialize};

use crate::models::Release;

/// Pagination block attached to every collection page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number, 1-indexed
    pub page: u32,

    /// Total number of pages at the requested page size
    pub pages: u32,

    pub per_page: u32,

    /// Total items in the collection
    pub items: u64,
}

impl Pagination {
    /// Whether more pages follow this one.
    pub fn has_next(&self) -> bool {
        self.page < self.pages
    }

    /// Whether this is the final page.
    pub fn is_last(&self) -> bool {
        self.page >= self.pages
    }
}

/// One decoded page of collection items.
#[derive(Debug, Clone)]
pub struct CollectionPage {
    pub pagination: Pagination,
    pub releases: Vec<Release>,
}

impl CollectionPage {
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

/// Parameters of a single collection page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub username: String,

    /// Collection folder, 0 meaning the built-in "All" folder
    pub folder: u32,

    pub page: u32,
    pub per_page: u32,
}

/// Monetary value estimate of a collection.
///
/// The API serves these as formatted strings with currency symbols, so
/// they pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CollectionValue {
    #[serde(default)]
    pub minimum: String,

    #[serde(default)]
    pub median: String,

    #[serde(default)]
    pub maximum: String,
}

impl CollectionValue {
    /// One-line display form.
    pub fn summary(&self) -> String {
        format!(
            "Min: {}, Median: {}, Max: {}",
            self.minimum, self.median, self.maximum
        )
    }
}
