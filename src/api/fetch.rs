// src/api/fetch.rs

//! Retrying page fetches: classification, backoff, and decoding.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{CollectionPage, PageQuery, Pagination, Release, RetryConfig};
use crate::utils::retry_delay;
use crate::utils::shutdown::Shutdown;

use super::{CatalogApi, RateLimiter};

/// Fetches single collection pages through the rate limiter with
/// bounded retries.
pub struct PageFetcher {
    api: Arc<dyn CatalogApi>,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
    shutdown: Shutdown,
}

impl PageFetcher {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        limiter: Arc<RateLimiter>,
        retry: RetryConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            api,
            limiter,
            retry,
            shutdown,
        }
    }

    /// Fetch and decode one page.
    ///
    /// Transient failures retry with capped exponential backoff. A
    /// remote 429 waits out at least the full rate window unless the
    /// reply named a shorter Retry-After. Auth and other client errors
    /// fail on the first attempt.
    pub async fn fetch_page(&self, query: &PageQuery) -> Result<CollectionPage> {
        let context = format!("collection page {}", query.page);
        let mut attempt: u32 = 0;
        loop {
            if self.shutdown.is_cancelled() {
                return Err(AppError::Interrupted);
            }
            self.limiter.acquire().await;

            let error = match self.api.get_page(query).await {
                Ok(payload) => return decode_page(payload, query.page),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }
            if attempt + 1 >= self.retry.max_attempts {
                return Err(AppError::retries_exhausted(
                    context,
                    self.retry.max_attempts,
                    error,
                ));
            }

            let delay = self.delay_for(&error, attempt);
            log::warn!(
                "{} failed (attempt {}/{}), retrying in {:.1}s: {}",
                context,
                attempt + 1,
                self.retry.max_attempts,
                delay.as_secs_f64(),
                error
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => return Err(AppError::Interrupted),
            }
            attempt += 1;
        }
    }

    /// Delay before the next attempt. After a 429 the local admission
    /// history is out of step with the server, so the wait is at least
    /// the full window (or the server's own Retry-After when present).
    fn delay_for(&self, error: &AppError, attempt: u32) -> Duration {
        let backoff = retry_delay(attempt, &self.retry);
        match error {
            AppError::RateLimited { retry_after } => {
                backoff.max(retry_after.unwrap_or_else(|| self.limiter.window()))
            }
            _ => backoff,
        }
    }
}

/// Decode a raw page payload at record granularity.
///
/// A payload without a pagination block is unusable and fails the
/// page. A malformed release entry is logged and skipped so the rest
/// of the page survives.
pub fn decode_page(payload: serde_json::Value, page: u32) -> Result<CollectionPage> {
    let context = format!("collection page {}", page);
    let pagination: Pagination = match payload.get("pagination") {
        Some(block) => serde_json::from_value(block.clone())
            .map_err(|e| AppError::decode(context.as_str(), e))?,
        None => return Err(AppError::decode(context.as_str(), "missing pagination block")),
    };

    let raw_releases = match payload.get("releases") {
        Some(serde_json::Value::Array(entries)) => entries.clone(),
        _ => Vec::new(),
    };

    let mut releases = Vec::with_capacity(raw_releases.len());
    let mut skipped = 0usize;
    for raw in raw_releases {
        match serde_json::from_value::<Release>(raw) {
            Ok(release) => releases.push(release),
            Err(e) => {
                skipped += 1;
                log::warn!("Skipping malformed entry on page {}: {}", page, e);
            }
        }
    }
    if skipped > 0 {
        log::warn!(
            "Page {}: {} of {} entries were malformed",
            page,
            skipped,
            skipped + releases.len()
        );
    }

    Ok(CollectionPage {
        pagination,
        releases,
    })
}
