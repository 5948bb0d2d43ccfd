// src/state/mod.rs

//! Durable run progress: the checkpoint document, its on-disk store,
//! and the policy deciding when a save is due.
//!
//! Layout on disk:
//! {state_dir}/progress.json

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::AssetKind;

/// Current checkpoint schema version.
const CHECKPOINT_VERSION: u32 = 1;

/// Name of the progress file inside the state directory.
const PROGRESS_FILE: &str = "progress.json";

/// Durable snapshot of how far a dump has progressed.
///
/// `last_page` is a watermark: the highest page whose records have all
/// been fully enriched, with every earlier page also complete. The
/// completion sets are keyed by collection instance id, since the same
/// release can sit in a collection more than once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    /// Schema version, bumped on incompatible layout changes
    pub version: u32,

    /// Owner of the collection this progress belongs to
    pub username: String,

    /// Highest fully processed page, 0 when none is complete yet
    pub last_page: u32,

    /// Whether a run finished the whole collection
    #[serde(default)]
    pub completed: bool,

    /// Collection totals observed during the run
    pub total_pages: u32,
    pub total_items: u64,

    /// Instance ids with a generated QR image on disk
    pub completed_qr: BTreeSet<u64>,

    /// Instance ids with a downloaded cover on disk
    pub completed_covers: BTreeSet<u64>,

    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh checkpoint for a user with nothing processed yet.
    pub fn new(username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: CHECKPOINT_VERSION,
            username: username.into(),
            last_page: 0,
            completed: false,
            total_pages: 0,
            total_items: 0,
            completed_qr: BTreeSet::new(),
            completed_covers: BTreeSet::new(),
            started_at: now,
            saved_at: now,
        }
    }

    /// Page the stream should resume at.
    ///
    /// The watermark page is fetched again: its records are already
    /// enriched (their ids sit in the completion sets, so the work is
    /// skipped) but they may not have reached the export before the
    /// interruption. Pages before the watermark are never re-fetched.
    ///
    /// A checkpoint from a fully completed run restarts at page 1; the
    /// completion sets still apply, so assets are not produced twice.
    pub fn resume_page(&self) -> u32 {
        if self.completed {
            return 1;
        }
        self.last_page.max(1)
    }

    /// Whether this asset already exists for the instance.
    pub fn is_complete(&self, kind: AssetKind, instance_id: u64) -> bool {
        self.set_for(kind).contains(&instance_id)
    }

    /// Record a produced asset.
    pub fn mark_complete(&mut self, kind: AssetKind, instance_id: u64) {
        self.set_for_mut(kind).insert(instance_id);
    }

    /// Number of completed assets of one kind.
    pub fn completed_count(&self, kind: AssetKind) -> usize {
        self.set_for(kind).len()
    }

    fn set_for(&self, kind: AssetKind) -> &BTreeSet<u64> {
        match kind {
            AssetKind::Qr => &self.completed_qr,
            AssetKind::Cover => &self.completed_covers,
        }
    }

    fn set_for_mut(&mut self, kind: AssetKind) -> &mut BTreeSet<u64> {
        match kind {
            AssetKind::Qr => &mut self.completed_qr,
            AssetKind::Cover => &mut self.completed_covers,
        }
    }
}

/// Loads and atomically saves the progress file.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Store backed by `{state_dir}/progress.json`.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: state_dir.into().join(PROGRESS_FILE),
        }
    }

    /// Path of the progress file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist atomically: write a temp file, flush, rename over the
    /// final path. A crash at any point leaves the previous file
    /// intact; a stray temp file is overwritten by the next save.
    pub async fn save(&self, checkpoint: &mut Checkpoint) -> Result<()> {
        checkpoint.saved_at = Utc::now();
        let bytes = serde_json::to_vec_pretty(checkpoint)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;

        log::debug!(
            "Checkpoint saved: page {}, {} qr, {} covers",
            checkpoint.last_page,
            checkpoint.completed_qr.len(),
            checkpoint.completed_covers.len()
        );
        Ok(())
    }

    /// Load the checkpoint for `username`.
    ///
    /// Missing, unreadable, foreign-schema, and foreign-user files all
    /// come back as `None`, so a bad state file degrades to a fresh
    /// start instead of poisoning the run.
    pub async fn load(&self, username: &str) -> Result<Option<Checkpoint>> {
        let Some(checkpoint) = self.load_any().await? else {
            return Ok(None);
        };
        if checkpoint.username != username {
            log::warn!(
                "Ignoring checkpoint for user '{}' at {}",
                checkpoint.username,
                self.path.display()
            );
            return Ok(None);
        }
        Ok(Some(checkpoint))
    }

    /// Load whatever valid checkpoint is on disk, regardless of user.
    pub async fn load_any(&self) -> Result<Option<Checkpoint>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };
        match serde_json::from_slice::<Checkpoint>(&bytes) {
            Ok(checkpoint) if checkpoint.version == CHECKPOINT_VERSION => Ok(Some(checkpoint)),
            Ok(checkpoint) => {
                log::warn!(
                    "Ignoring checkpoint with unsupported version {}",
                    checkpoint.version
                );
                Ok(None)
            }
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable checkpoint at {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Remove the progress file. Absence is not an error.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

/// Decides when progress is worth persisting: after a record count or
/// a time interval, whichever comes first.
#[derive(Debug)]
pub struct SavePolicy {
    every_records: u64,
    every: Duration,
    records_since_save: u64,
    last_save: Instant,
}

impl SavePolicy {
    pub fn new(every_records: u64, every: Duration) -> Self {
        Self {
            every_records: every_records.max(1),
            every,
            records_since_save: 0,
            last_save: Instant::now(),
        }
    }

    /// Note records processed since the last save.
    pub fn record(&mut self, count: u64) {
        self.records_since_save += count;
    }

    /// Whether a save is due. Never true while nothing new has been
    /// processed.
    pub fn should_save(&self) -> bool {
        self.records_since_save > 0
            && (self.records_since_save >= self.every_records
                || self.last_save.elapsed() >= self.every)
    }

    /// Reset both thresholds after a successful save.
    pub fn mark_saved(&mut self) {
        self.records_since_save = 0;
        self.last_save = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_checkpoint() -> Checkpoint {
        let mut checkpoint = Checkpoint::new("octave");
        checkpoint.last_page = 3;
        checkpoint.total_pages = 10;
        checkpoint.total_items = 940;
        checkpoint.mark_complete(AssetKind::Qr, 101);
        checkpoint.mark_complete(AssetKind::Qr, 102);
        checkpoint.mark_complete(AssetKind::Cover, 101);
        checkpoint
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut checkpoint = make_checkpoint();

        store.save(&mut checkpoint).await.unwrap();
        let loaded = store.load("octave").await.unwrap().unwrap();

        assert_eq!(loaded, checkpoint);
        assert!(loaded.is_complete(AssetKind::Qr, 102));
        assert!(!loaded.is_complete(AssetKind::Cover, 102));
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.load("octave").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        tokio::fs::write(store.path(), b"{ truncated").await.unwrap();
        assert!(store.load("octave").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn foreign_user_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut checkpoint = make_checkpoint();
        store.save(&mut checkpoint).await.unwrap();

        assert!(store.load("somebody-else").await.unwrap().is_none());
        assert!(store.load_any().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unsupported_version_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut checkpoint = make_checkpoint();
        checkpoint.version = 99;
        let bytes = serde_json::to_vec(&checkpoint).unwrap();
        tokio::fs::create_dir_all(dir.path()).await.unwrap();
        tokio::fs::write(store.path(), bytes).await.unwrap();

        assert!(store.load("octave").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stray_temp_file_does_not_break_the_store() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut checkpoint = make_checkpoint();
        store.save(&mut checkpoint).await.unwrap();

        // A crash between temp write and rename leaves a stray file
        // behind; the real progress file must stay readable.
        let tmp = store.path().with_extension("tmp");
        tokio::fs::write(&tmp, b"half-written garbage").await.unwrap();

        let loaded = store.load("octave").await.unwrap().unwrap();
        assert_eq!(loaded.last_page, 3);

        // The next save replaces the stray file.
        checkpoint.last_page = 4;
        store.save(&mut checkpoint).await.unwrap();
        assert_eq!(store.load("octave").await.unwrap().unwrap().last_page, 4);
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut checkpoint = make_checkpoint();
        store.save(&mut checkpoint).await.unwrap();

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load("octave").await.unwrap().is_none());
    }

    #[test]
    fn resume_page_never_goes_below_one() {
        let mut checkpoint = Checkpoint::new("octave");
        assert_eq!(checkpoint.resume_page(), 1);
        checkpoint.last_page = 7;
        assert_eq!(checkpoint.resume_page(), 7);
    }

    #[test]
    fn completed_checkpoint_restarts_from_the_top() {
        let mut checkpoint = make_checkpoint();
        checkpoint.last_page = 10;
        checkpoint.completed = true;

        assert_eq!(checkpoint.resume_page(), 1);
        // Completion sets survive, so assets are still skipped.
        assert!(checkpoint.is_complete(AssetKind::Qr, 101));
    }

    #[test]
    fn completion_sets_are_independent_per_kind() {
        let mut checkpoint = Checkpoint::new("octave");
        checkpoint.mark_complete(AssetKind::Qr, 5);

        assert!(checkpoint.is_complete(AssetKind::Qr, 5));
        assert!(!checkpoint.is_complete(AssetKind::Cover, 5));
        assert_eq!(checkpoint.completed_count(AssetKind::Qr), 1);
        assert_eq!(checkpoint.completed_count(AssetKind::Cover), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn save_policy_record_threshold() {
        let mut policy = SavePolicy::new(50, Duration::from_secs(3600));
        assert!(!policy.should_save());

        policy.record(49);
        assert!(!policy.should_save());
        policy.record(1);
        assert!(policy.should_save());

        policy.mark_saved();
        assert!(!policy.should_save());
    }

    #[tokio::test(start_paused = true)]
    async fn save_policy_time_threshold() {
        let mut policy = SavePolicy::new(1_000_000, Duration::from_secs(30));
        policy.record(1);
        assert!(!policy.should_save());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(policy.should_save());

        policy.mark_saved();
        policy.record(1);
        assert!(!policy.should_save());
    }

    #[tokio::test(start_paused = true)]
    async fn save_policy_idle_time_does_not_trigger() {
        let policy = SavePolicy::new(50, Duration::from_secs(30));
        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(!policy.should_save());
    }
}
