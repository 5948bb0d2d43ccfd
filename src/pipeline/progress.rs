// src/pipeline/progress.rs

//! Page-level completion tracking behind the resume watermark.

use std::collections::BTreeMap;

/// Tracks which pages are fully settled and maintains the contiguous
/// watermark the checkpoint records.
///
/// A page is settled once it has been closed (every record planned)
/// and every dispatched job came back without failure. The watermark
/// only advances across a contiguous prefix of settled pages, so an
/// unfinished or failed page holds it in place and a resumed run picks
/// that page up again.
#[derive(Debug)]
pub struct PageTracker {
    watermark: u32,
    pages: BTreeMap<u32, PageState>,
}

#[derive(Debug, Default)]
struct PageState {
    pending: usize,
    failed: usize,
    withdrawn: usize,
    closed: bool,
}

impl PageTracker {
    /// Tracker for a run starting at `start_page`; the initial
    /// watermark sits just before it.
    pub fn new(start_page: u32) -> Self {
        Self {
            watermark: start_page.max(1) - 1,
            pages: BTreeMap::new(),
        }
    }

    /// Highest page below which everything is settled.
    pub fn watermark(&self) -> u32 {
        self.watermark
    }

    /// Note a job dispatched for a page.
    pub fn job_started(&mut self, page: u32) {
        self.pages.entry(page).or_default().pending += 1;
    }

    /// Note a job that never spawned because shutdown arrived first.
    /// The page stays unsettled: its work was not done, so a resumed
    /// run must pick it up again.
    pub fn job_withdrawn(&mut self, page: u32) {
        let state = self.pages.entry(page).or_default();
        state.pending = state.pending.saturating_sub(1);
        state.withdrawn += 1;
    }

    /// Note an outcome for a dispatched job.
    pub fn job_finished(&mut self, page: u32, failed: bool) {
        let state = self.pages.entry(page).or_default();
        state.pending = state.pending.saturating_sub(1);
        if failed {
            state.failed += 1;
        }
        self.advance();
    }

    /// Mark a page fully planned; no more jobs will arrive for it.
    pub fn page_closed(&mut self, page: u32) {
        self.pages.entry(page).or_default().closed = true;
        self.advance();
    }

    fn advance(&mut self) {
        loop {
            let next = self.watermark + 1;
            let Some(state) = self.pages.get(&next) else {
                break;
            };
            if !state.closed || state.pending > 0 || state.failed > 0 || state.withdrawn > 0 {
                break;
            }
            self.pages.remove(&next);
            self.watermark = next;
        }
    }
}
