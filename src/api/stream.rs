// src/api/stream.rs

//! Sequential pull-based pagination over the page fetcher.

use futures::Stream;

use crate::error::Result;
use crate::models::{CollectionPage, PageQuery};

use super::PageFetcher;

/// Collection totals taken from the pagination block of the first
/// fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionTotals {
    pub pages: u32,
    pub items: u64,
}

/// Pull-based stream of collection pages in catalog order.
///
/// Pages are fetched strictly one at a time, so records keep their
/// catalog order within and across pages. Construction is cheap;
/// nothing goes over the wire until the first `next_page` call.
pub struct CollectionStream {
    fetcher: PageFetcher,
    username: String,
    folder: u32,
    per_page: u32,
    next_page: u32,
    totals: Option<CollectionTotals>,
    finished: bool,
}

impl CollectionStream {
    /// Stream starting at `start_page` (1 for a fresh run).
    pub fn new(
        fetcher: PageFetcher,
        username: impl Into<String>,
        folder: u32,
        per_page: u32,
        start_page: u32,
    ) -> Self {
        Self {
            fetcher,
            username: username.into(),
            folder,
            per_page: per_page.clamp(1, 100),
            next_page: start_page.max(1),
            totals: None,
            finished: false,
        }
    }

    /// Totals reported by the API, available once the first page has
    /// been fetched.
    pub fn totals(&self) -> Option<CollectionTotals> {
        self.totals
    }

    /// Fetch the next page, or `None` once the collection is exhausted.
    ///
    /// An error does not advance the stream; an immediately-exhausted
    /// collection comes back as `None` on the first call.
    pub async fn next_page(&mut self) -> Result<Option<CollectionPage>> {
        if self.finished {
            return Ok(None);
        }
        if let Some(totals) = self.totals {
            if self.next_page > totals.pages {
                self.finished = true;
                return Ok(None);
            }
        }

        let query = PageQuery {
            username: self.username.clone(),
            folder: self.folder,
            page: self.next_page,
            per_page: self.per_page,
        };
        let page = self.fetcher.fetch_page(&query).await?;

        self.totals = Some(CollectionTotals {
            pages: page.pagination.pages,
            items: page.pagination.items,
        });
        self.next_page += 1;

        if page.pagination.items == 0 {
            self.finished = true;
            return Ok(None);
        }
        Ok(Some(page))
    }

    /// Adapt into a `futures` stream of pages.
    pub fn into_pages(self) -> impl Stream<Item = Result<CollectionPage>> {
        futures::stream::try_unfold(self, |mut stream| async move {
            let page = stream.next_page().await?;
            Ok(page.map(|p| (p, stream)))
        })
    }
}
