// src/enrich/mod.rs

//! Concurrent asset enrichment: QR images and cover art.
//!
//! The scheduler plans work per record against the checkpoint and the
//! filesystem, then dispatches it into a `JoinSet` behind a semaphore.
//! One failed asset never takes down its siblings or the record.

pub mod cover;
pub mod qr;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::error::Result;
use crate::models::{AssetKind, EnrichConfig, Release};
use crate::state::Checkpoint;
use crate::utils::sanitize::asset_filename;
use crate::utils::shutdown::Shutdown;

pub use cover::DiskAssetWriter;

/// Capability to materialize assets on disk.
#[async_trait]
pub trait AssetWriter: Send + Sync {
    /// Render a QR image encoding `data` to `path`.
    async fn render_code(&self, data: &str, path: &Path) -> Result<()>;

    /// Download the image at `url` to `path`.
    async fn fetch_cover(&self, url: &str, path: &Path) -> Result<()>;
}

/// What happened to one asset of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetStatus {
    /// The run did not ask for this asset kind
    NotRequested,

    /// Written during this run
    Written(PathBuf),

    /// Work skipped, the asset is already accounted for
    Skipped { reason: SkipReason, path: PathBuf },

    /// The record carries no source for this asset
    NoSource,

    /// Asset failed; the record itself survives
    Failed(String),
}

/// Why an asset was skipped rather than produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The checkpoint says an earlier run produced it
    AlreadyComplete,

    /// The target file already exists on disk
    FileExists,
}

impl AssetStatus {
    /// Path of the asset when one is known.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Written(path) => Some(path),
            Self::Skipped { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Enrichment results attached to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub qr: AssetStatus,
    pub cover: AssetStatus,
}

impl Enrichment {
    pub fn empty() -> Self {
        Self {
            qr: AssetStatus::NotRequested,
            cover: AssetStatus::NotRequested,
        }
    }

    pub fn set(&mut self, kind: AssetKind, status: AssetStatus) {
        match kind {
            AssetKind::Qr => self.qr = status,
            AssetKind::Cover => self.cover = status,
        }
    }

    /// Whether no requested asset failed. Skips and missing sources
    /// count as resolved; only failures hold back the page watermark.
    pub fn is_fully_resolved(&self) -> bool {
        !self.qr.is_failure() && !self.cover.is_failure()
    }
}

/// Which asset kinds a run asked for.
#[derive(Debug, Clone, Copy)]
pub struct EnrichRequest {
    pub qr: bool,
    pub covers: bool,
    pub overwrite: bool,
}

impl EnrichRequest {
    pub fn none() -> Self {
        Self {
            qr: false,
            covers: false,
            overwrite: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.qr && !self.covers
    }
}

/// One unit of enrichment work ready to dispatch.
#[derive(Debug, Clone)]
pub struct AssetJob {
    pub instance_id: u64,
    pub kind: AssetKind,
    pub path: PathBuf,
    /// QR payload or cover URL
    pub source: String,
    /// "Artist - Title", for logs
    pub context: String,
}

/// Result of one dispatched or immediately-settled job.
#[derive(Debug)]
pub struct AssetOutcome {
    pub instance_id: u64,
    pub kind: AssetKind,
    pub status: AssetStatus,
}

/// Plans and dispatches enrichment work under a concurrency cap.
pub struct EnrichmentScheduler {
    writer: Arc<dyn AssetWriter>,
    semaphore: Arc<Semaphore>,
    qr_dir: PathBuf,
    cover_dir: PathBuf,
    shutdown: Shutdown,
}

impl EnrichmentScheduler {
    pub fn new(writer: Arc<dyn AssetWriter>, config: &EnrichConfig, shutdown: Shutdown) -> Self {
        Self {
            writer,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            qr_dir: PathBuf::from(&config.qr_dir),
            cover_dir: PathBuf::from(&config.cover_dir),
            shutdown,
        }
    }

    /// Create the output directories the request needs.
    pub async fn ensure_dirs(&self, request: EnrichRequest) -> Result<()> {
        if request.qr {
            tokio::fs::create_dir_all(&self.qr_dir).await?;
        }
        if request.covers {
            tokio::fs::create_dir_all(&self.cover_dir).await?;
        }
        Ok(())
    }

    /// Target path for one asset of one record.
    pub fn asset_path(&self, kind: AssetKind, release: &Release) -> PathBuf {
        let dir = match kind {
            AssetKind::Qr => &self.qr_dir,
            AssetKind::Cover => &self.cover_dir,
        };
        dir.join(asset_filename(
            release.id,
            &release.artist(),
            release.title(),
            kind.extension(),
        ))
    }

    /// Decide what to do for one record: jobs to dispatch, plus
    /// outcomes settled without work.
    ///
    /// Precedence per asset: the checkpoint's completion set wins over
    /// everything, a missing source beats the filesystem check, and an
    /// existing file is only overwritten when asked.
    pub async fn plan(
        &self,
        release: &Release,
        request: EnrichRequest,
        checkpoint: &Checkpoint,
    ) -> (Vec<AssetJob>, Vec<AssetOutcome>) {
        let mut jobs = Vec::new();
        let mut settled = Vec::new();
        let context = format!("{} - {}", release.artist(), release.title());

        if request.qr {
            let path = self.asset_path(AssetKind::Qr, release);
            if checkpoint.is_complete(AssetKind::Qr, release.instance_id) {
                settled.push(skip(release, AssetKind::Qr, SkipReason::AlreadyComplete, path));
            } else if !request.overwrite && exists(&path).await {
                settled.push(skip(release, AssetKind::Qr, SkipReason::FileExists, path));
            } else {
                jobs.push(AssetJob {
                    instance_id: release.instance_id,
                    kind: AssetKind::Qr,
                    path,
                    source: release.web_url(),
                    context: context.clone(),
                });
            }
        }

        if request.covers {
            let path = self.asset_path(AssetKind::Cover, release);
            if checkpoint.is_complete(AssetKind::Cover, release.instance_id) {
                settled.push(skip(release, AssetKind::Cover, SkipReason::AlreadyComplete, path));
            } else if release.cover_source().is_none() {
                log::debug!("No cover art source for {}", context);
                settled.push(AssetOutcome {
                    instance_id: release.instance_id,
                    kind: AssetKind::Cover,
                    status: AssetStatus::NoSource,
                });
            } else if !request.overwrite && exists(&path).await {
                settled.push(skip(release, AssetKind::Cover, SkipReason::FileExists, path));
            } else if let Some(url) = release.cover_source() {
                jobs.push(AssetJob {
                    instance_id: release.instance_id,
                    kind: AssetKind::Cover,
                    path,
                    source: url.to_string(),
                    context,
                });
            }
        }

        (jobs, settled)
    }

    /// Dispatch jobs into the join set, waiting on the concurrency
    /// gate for each.
    ///
    /// Returns the jobs that were not spawned because shutdown arrived
    /// first; the caller unwinds its bookkeeping for those, and a
    /// resumed run plans them again.
    pub async fn dispatch(
        &self,
        jobs: Vec<AssetJob>,
        tasks: &mut JoinSet<AssetOutcome>,
    ) -> Vec<AssetJob> {
        let mut jobs = jobs.into_iter();
        while let Some(job) = jobs.next() {
            if self.shutdown.is_cancelled() {
                return std::iter::once(job).chain(jobs).collect();
            }
            let permit = tokio::select! {
                permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return std::iter::once(job).chain(jobs).collect(),
                },
                _ = self.shutdown.cancelled() => {
                    return std::iter::once(job).chain(jobs).collect();
                }
            };
            tasks.spawn(run_job(Arc::clone(&self.writer), job, permit));
        }
        Vec::new()
    }
}

async fn run_job(
    writer: Arc<dyn AssetWriter>,
    job: AssetJob,
    permit: OwnedSemaphorePermit,
) -> AssetOutcome {
    let result = match job.kind {
        AssetKind::Qr => writer.render_code(&job.source, &job.path).await,
        AssetKind::Cover => writer.fetch_cover(&job.source, &job.path).await,
    };
    drop(permit);

    let status = match result {
        Ok(()) => {
            log::debug!("Wrote {} for {}", job.kind, job.context);
            AssetStatus::Written(job.path)
        }
        Err(e) => {
            log::warn!("Failed {} for {}: {}", job.kind, job.context, e);
            AssetStatus::Failed(e.to_string())
        }
    };
    AssetOutcome {
        instance_id: job.instance_id,
        kind: job.kind,
        status,
    }
}

fn skip(release: &Release, kind: AssetKind, reason: SkipReason, path: PathBuf) -> AssetOutcome {
    AssetOutcome {
        instance_id: release.instance_id,
        kind,
        status: AssetStatus::Skipped { reason, path },
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
