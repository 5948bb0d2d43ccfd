// src/pipeline/run.rs

//! The orchestrator: streams pages, fans out enrichment, checkpoints
//! progress, and hands the merged record list to the caller.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;

use crate::api::{CollectionStream, PageFetcher};
use crate::enrich::{AssetOutcome, AssetStatus, EnrichRequest, Enrichment, EnrichmentScheduler};
use crate::error::{AppError, Result};
use crate::models::{AssetKind, Config, Release};
use crate::state::{Checkpoint, CheckpointStore, SavePolicy};
use crate::utils::shutdown::Shutdown;

use super::progress::PageTracker;
use super::summary::RunSummary;

/// What a run should do.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Pick up from saved progress instead of starting fresh
    pub resume: bool,

    /// Which assets to produce
    pub request: EnrichRequest,
}

/// Everything a finished or interrupted run hands back.
#[derive(Debug)]
pub struct PipelineReport {
    /// Records in catalog order from the start page on, each with its
    /// enrichment results merged back in
    pub records: Vec<(Release, Enrichment)>,
    pub total_pages: u32,
    pub total_items: u64,
    /// Page the run started at; above 1 when progress was resumed
    pub start_page: u32,
    /// True when the run was cut short by the shutdown signal
    pub interrupted: bool,
    pub summary: RunSummary,
}

impl PipelineReport {
    /// Whether this run covered only a tail of the collection.
    pub fn is_partial(&self) -> bool {
        self.start_page > 1
    }
}

/// Wires the page stream, the enrichment scheduler, and the checkpoint
/// store into one resumable run.
pub struct CollectionPipeline {
    fetcher: PageFetcher,
    scheduler: EnrichmentScheduler,
    store: CheckpointStore,
    policy: SavePolicy,
    shutdown: Shutdown,
    username: String,
    folder: u32,
    per_page: u32,
}

impl CollectionPipeline {
    pub fn new(
        config: &Config,
        username: impl Into<String>,
        fetcher: PageFetcher,
        scheduler: EnrichmentScheduler,
        store: CheckpointStore,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            fetcher,
            scheduler,
            store,
            policy: SavePolicy::new(
                config.checkpoint.save_every_records,
                Duration::from_secs(config.checkpoint.save_every_secs),
            ),
            shutdown,
            username: username.into(),
            folder: config.api.folder,
            per_page: config.api.page_size,
        }
    }

    /// Execute one run.
    ///
    /// Interruption stops page streaming and new dispatches, drains
    /// in-flight work, saves a final checkpoint, and returns a report
    /// flagged `interrupted`. Fatal errors abort outstanding work and
    /// leave the last durable checkpoint in place for a future resume.
    pub async fn run(self, options: RunOptions) -> Result<PipelineReport> {
        let CollectionPipeline {
            fetcher,
            scheduler,
            store,
            mut policy,
            shutdown,
            username,
            folder,
            per_page,
        } = self;
        let started = Instant::now();

        let mut checkpoint = match (options.resume, store.load(&username).await?) {
            (true, Some(checkpoint)) => checkpoint,
            (true, None) => {
                log::info!("No saved progress for {}, starting fresh", username);
                Checkpoint::new(&username)
            }
            (false, _) => Checkpoint::new(&username),
        };
        let start_page = checkpoint.resume_page();
        if options.resume && start_page > 1 {
            log::info!(
                "Resuming from page {} ({} QR codes, {} covers already complete)",
                start_page,
                checkpoint.completed_count(AssetKind::Qr),
                checkpoint.completed_count(AssetKind::Cover),
            );
        }
        checkpoint.completed = false;

        scheduler.ensure_dirs(options.request).await?;

        let mut stream = CollectionStream::new(fetcher, &username, folder, per_page, start_page);
        let mut tracker = PageTracker::new(start_page);
        let mut summary = RunSummary::new();
        let mut tasks: JoinSet<AssetOutcome> = JoinSet::new();
        let mut in_flight: HashMap<(u64, AssetKind), u32> = HashMap::new();
        let mut enrichments: HashMap<u64, Enrichment> = HashMap::new();
        let mut records: Vec<Release> = Vec::new();
        let mut interrupted = false;

        loop {
            if shutdown.is_cancelled() {
                interrupted = true;
                break;
            }

            let page = match stream.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(AppError::Interrupted) => {
                    interrupted = true;
                    break;
                }
                Err(e) => {
                    abort_outstanding(&mut tasks).await;
                    return Err(e);
                }
            };

            let page_no = page.pagination.page;
            if let Some(totals) = stream.totals() {
                checkpoint.total_pages = totals.pages;
                checkpoint.total_items = totals.items;
            }
            summary.pages_fetched += 1;
            log::info!(
                "Page {}/{}: {} records",
                page_no,
                checkpoint.total_pages.max(page_no),
                page.len()
            );

            for release in &page.releases {
                enrichments.insert(release.instance_id, Enrichment::empty());
                let (jobs, settled) = scheduler.plan(release, options.request, &checkpoint).await;
                for outcome in settled {
                    apply_outcome(
                        outcome,
                        &mut checkpoint,
                        &mut tracker,
                        &mut in_flight,
                        &mut enrichments,
                    );
                }
                if !jobs.is_empty() {
                    for job in &jobs {
                        tracker.job_started(page_no);
                        in_flight.insert((job.instance_id, job.kind), page_no);
                    }
                    let leftover = scheduler.dispatch(jobs, &mut tasks).await;
                    for job in leftover {
                        tracker.job_withdrawn(page_no);
                        in_flight.remove(&(job.instance_id, job.kind));
                    }
                }
                // Keep the outcome queue short while streaming.
                while let Some(joined) = tasks.try_join_next() {
                    handle_joined(
                        joined,
                        &mut checkpoint,
                        &mut tracker,
                        &mut in_flight,
                        &mut enrichments,
                    );
                }
            }

            tracker.page_closed(page_no);
            summary.records_seen += page.len() as u64;
            policy.record(page.len() as u64);
            records.extend(page.releases);

            checkpoint.last_page = checkpoint.last_page.max(tracker.watermark());
            if policy.should_save() {
                if let Err(e) = store.save(&mut checkpoint).await {
                    abort_outstanding(&mut tasks).await;
                    return Err(e);
                }
                policy.mark_saved();
            }
        }

        if interrupted && !tasks.is_empty() {
            log::info!("Draining {} in-flight enrichment tasks", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            handle_joined(
                joined,
                &mut checkpoint,
                &mut tracker,
                &mut in_flight,
                &mut enrichments,
            );
        }

        if let Some(totals) = stream.totals() {
            checkpoint.total_pages = totals.pages;
            checkpoint.total_items = totals.items;
        }
        checkpoint.last_page = checkpoint.last_page.max(tracker.watermark());
        checkpoint.completed = !interrupted;
        store.save(&mut checkpoint).await?;
        if interrupted {
            log::info!("Interrupted; progress saved to {}", store.path().display());
        }

        // Pages before the resume point are always full, so the skipped
        // prefix is exact once the totals are known.
        summary.records_skipped = u64::from(start_page - 1)
            .saturating_mul(u64::from(per_page))
            .min(checkpoint.total_items);

        let mut merged = Vec::with_capacity(records.len());
        for release in records {
            let enrichment = enrichments
                .remove(&release.instance_id)
                .unwrap_or_else(Enrichment::empty);
            summary.tally(&enrichment);
            merged.push((release, enrichment));
        }
        summary.log(started.elapsed());

        Ok(PipelineReport {
            records: merged,
            total_pages: checkpoint.total_pages,
            total_items: checkpoint.total_items,
            start_page,
            interrupted,
            summary,
        })
    }
}

fn apply_outcome(
    outcome: AssetOutcome,
    checkpoint: &mut Checkpoint,
    tracker: &mut PageTracker,
    in_flight: &mut HashMap<(u64, AssetKind), u32>,
    enrichments: &mut HashMap<u64, Enrichment>,
) {
    let page = in_flight.remove(&(outcome.instance_id, outcome.kind));
    if matches!(
        outcome.status,
        AssetStatus::Written(_) | AssetStatus::Skipped { .. }
    ) {
        checkpoint.mark_complete(outcome.kind, outcome.instance_id);
    }
    let failed = outcome.status.is_failure();
    enrichments
        .entry(outcome.instance_id)
        .or_insert_with(Enrichment::empty)
        .set(outcome.kind, outcome.status);
    if let Some(page) = page {
        tracker.job_finished(page, failed);
    }
}

fn handle_joined(
    joined: std::result::Result<AssetOutcome, JoinError>,
    checkpoint: &mut Checkpoint,
    tracker: &mut PageTracker,
    in_flight: &mut HashMap<(u64, AssetKind), u32>,
    enrichments: &mut HashMap<u64, Enrichment>,
) {
    match joined {
        Ok(outcome) => apply_outcome(outcome, checkpoint, tracker, in_flight, enrichments),
        // A panicked task leaves its page pending, which pins the
        // watermark there; the records get another chance on resume.
        Err(e) => log::error!("Enrichment task aborted: {}", e),
    }
}

async fn abort_outstanding(tasks: &mut JoinSet<AssetOutcome>) {
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
}
