// src/pipeline/summary.rs

//! End-of-run accounting.

use std::time::Duration;

use crate::enrich::{AssetStatus, Enrichment};
use crate::models::AssetKind;

/// Tallies of what a run did, surfaced to the caller and logged at the
/// end. A resumed run shows its savings here: skipped counts are work
/// an earlier run already paid for.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_fetched: u32,
    pub records_seen: u64,
    /// Records on pages before the resume point, never re-fetched
    pub records_skipped: u64,
    pub qr_written: u64,
    pub qr_skipped: u64,
    pub covers_written: u64,
    pub covers_skipped: u64,
    pub covers_missing: u64,
    pub failures: u64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record's enrichment into the tallies.
    pub fn tally(&mut self, enrichment: &Enrichment) {
        self.tally_status(AssetKind::Qr, &enrichment.qr);
        self.tally_status(AssetKind::Cover, &enrichment.cover);
    }

    fn tally_status(&mut self, kind: AssetKind, status: &AssetStatus) {
        match (kind, status) {
            (_, AssetStatus::NotRequested) => {}
            (_, AssetStatus::Failed(_)) => self.failures += 1,
            (AssetKind::Qr, AssetStatus::Written(_)) => self.qr_written += 1,
            (AssetKind::Qr, AssetStatus::Skipped { .. }) => self.qr_skipped += 1,
            (AssetKind::Qr, AssetStatus::NoSource) => {}
            (AssetKind::Cover, AssetStatus::Written(_)) => self.covers_written += 1,
            (AssetKind::Cover, AssetStatus::Skipped { .. }) => self.covers_skipped += 1,
            (AssetKind::Cover, AssetStatus::NoSource) => self.covers_missing += 1,
        }
    }

    pub fn log(&self, elapsed: Duration) {
        log::info!(
            "Processed {} records over {} pages in {:.1}s",
            self.records_seen,
            self.pages_fetched,
            elapsed.as_secs_f64()
        );
        if self.records_skipped > 0 {
            log::info!(
                "Resume skipped {} records already processed by earlier runs",
                self.records_skipped
            );
        }
        log::info!(
            "QR codes: {} written, {} skipped. Covers: {} written, {} skipped, {} without a source",
            self.qr_written,
            self.qr_skipped,
            self.covers_written,
            self.covers_skipped,
            self.covers_missing
        );
        if self.failures > 0 {
            log::warn!(
                "{} enrichment tasks failed; rerun with --resume to retry them",
                self.failures
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::SkipReason;
    use std::path::PathBuf;

    #[test]
    fn tallies_each_status_bucket() {
        let mut summary = RunSummary::new();
        summary.tally(&Enrichment {
            qr: AssetStatus::Written(PathBuf::from("a.png")),
            cover: AssetStatus::NoSource,
        });
        summary.tally(&Enrichment {
            qr: AssetStatus::Skipped {
                reason: SkipReason::AlreadyComplete,
                path: PathBuf::from("b.png"),
            },
            cover: AssetStatus::Failed("boom".to_string()),
        });
        summary.tally(&Enrichment {
            qr: AssetStatus::NotRequested,
            cover: AssetStatus::Written(PathBuf::from("c.jpg")),
        });

        assert_eq!(summary.qr_written, 1);
        assert_eq!(summary.qr_skipped, 1);
        assert_eq!(summary.covers_written, 1);
        assert_eq!(summary.covers_missing, 1);
        assert_eq!(summary.failures, 1);
    }
}
