//! Core download pipeline.
//!
//! [`Downloader::run`] takes the extracted items, skips everything the
//! progress record already lists, and fetches the rest one at a time with a
//! fixed delay between attempts. Progress is checkpointed every
//! `checkpoint_every` attempts and once more when the run ends, whether it
//! finished, failed, or was cancelled.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::config::ScrapeConfig;
use crate::error::{Error, Result};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::sanitize::{extension_of, item_stem};
use crate::state::{ProgressRecord, ProgressStore};
use crate::stats::{RunSummary, SummaryBuilder};

/// One title and image URL to potentially download. The URL is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem {
    pub title: String,
    pub source_url: String,
}

impl WorkItem {
    #[must_use]
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
        }
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Written to disk.
    Success { bytes: u64 },
    /// Fetch or write failed.
    Failure { reason: String },
}

/// Result of one attempt within a run.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub item: WorkItem,
    pub outcome: DownloadOutcome,
    /// Where the file was written; `None` on failure.
    pub local_path: Option<PathBuf>,
}

impl DownloadResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Success { .. })
    }
}

/// Trait for receiving pipeline progress updates.
///
/// All methods have default no-op implementations.
pub trait DownloadProgress: Send + Sync {
    /// Called once before the first item, with the number of unique items.
    fn on_run_start(&self, _total: usize) {}

    /// Called for an item that an earlier run already downloaded.
    fn on_skipped(&self, _item: &WorkItem) {}

    /// Called before fetching an item. `position` is 1-based.
    fn on_item_start(&self, _position: usize, _total: usize, _item: &WorkItem) {}

    /// Called after an item was fetched and written, or failed.
    fn on_item_finished(&self, _result: &DownloadResult) {}

    /// Called after a periodic checkpoint was written.
    fn on_checkpoint(&self, _attempts: usize) {}

    /// Called once when the run stops, including on errors and cancellation.
    fn on_run_end(&self, _summary: &RunSummary) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Removes items with a repeated URL, keeping the first occurrence in order.
#[must_use]
pub fn dedup_items(items: &[WorkItem]) -> Vec<&WorkItem> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.source_url.as_str()))
        .collect()
}

/// Sequential, rate-limited, resumable downloader.
pub struct Downloader<H: Fetcher, S: ProgressStore, F: FileSystem = TokioFileSystem> {
    fetcher: H,
    store: S,
    fs: F,
    config: ScrapeConfig,
}

impl<H: Fetcher, S: ProgressStore> Downloader<H, S, TokioFileSystem> {
    /// Creates a downloader writing to the real file system.
    #[must_use]
    pub const fn new(fetcher: H, store: S, config: ScrapeConfig) -> Self {
        Self {
            fetcher,
            store,
            fs: TokioFileSystem,
            config,
        }
    }
}

impl<H: Fetcher, S: ProgressStore, F: FileSystem> Downloader<H, S, F> {
    /// Creates a downloader with a custom file system implementation.
    #[must_use]
    pub const fn with_fs(fetcher: H, store: S, fs: F, config: ScrapeConfig) -> Self {
        Self {
            fetcher,
            store,
            fs,
            config,
        }
    }

    /// Returns a reference to the run configuration.
    #[must_use]
    pub const fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Returns a reference to the progress store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Finds a free path for `{stem}{ext}` in the output directory, adding
    /// `-1`, `-2`, ... before the extension when the name is taken.
    pub async fn resolve_path(&self, stem: &str, ext: &str) -> PathBuf {
        let dir = &self.config.output_dir;
        let mut candidate = dir.join(format!("{stem}{ext}"));
        let mut counter = 1;
        while self.fs.file_exists(&candidate).await {
            candidate = dir.join(format!("{stem}-{counter}{ext}"));
            counter += 1;
        }
        candidate
    }

    /// Fetches one item and writes it to a fresh path.
    async fn download_item(&self, item: &WorkItem, position: usize) -> DownloadResult {
        let stem = item_stem(&item.title, &item.source_url, position);
        let ext = extension_of(&item.source_url);
        let path = self.resolve_path(&stem, &ext).await;

        let outcome = match self.fetcher.fetch(&item.source_url).await {
            FetchOutcome::Success(body) => match self.write(&path, &body).await {
                Ok(()) => DownloadOutcome::Success {
                    bytes: body.len() as u64,
                },
                Err(e) => {
                    log::warn!("Failed to write {}: {e}", path.display());
                    DownloadOutcome::Failure {
                        reason: format!("write failed: {e}"),
                    }
                }
            },
            failed => DownloadOutcome::Failure {
                reason: failed.failure_reason().unwrap_or_default(),
            },
        };

        let local_path = matches!(outcome, DownloadOutcome::Success { .. }).then_some(path);
        DownloadResult {
            item: item.clone(),
            outcome,
            local_path,
        }
    }

    async fn write(&self, path: &Path, body: &[u8]) -> std::io::Result<()> {
        self.fs.write_file(path, body).await
    }

    /// Downloads every item not yet in `record`, updating `record` as it goes.
    ///
    /// A final checkpoint is written however the loop ends.
    ///
    /// # Errors
    ///
    /// Per-item failures are counted, not returned. Returns an error if the
    /// output directory cannot be created, a checkpoint cannot be written,
    /// or `cancel` fires before the last item is processed.
    pub async fn run(
        &self,
        items: &[WorkItem],
        record: &mut ProgressRecord,
        progress: &dyn DownloadProgress,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let mut builder = SummaryBuilder::new();
        let result = self
            .run_items(items, record, progress, cancel, &mut builder)
            .await;

        let saved = self.store.save(record);
        let summary = builder.build();
        progress.on_run_end(&summary);

        match (result, saved) {
            (Ok(()), Ok(())) => Ok(summary),
            (Ok(()), Err(e)) => Err(Error::Checkpoint(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(save_err)) => {
                log::error!("Final checkpoint failed: {save_err}");
                Err(e)
            }
        }
    }

    async fn run_items(
        &self,
        items: &[WorkItem],
        record: &mut ProgressRecord,
        progress: &dyn DownloadProgress,
        cancel: &CancellationToken,
        builder: &mut SummaryBuilder,
    ) -> Result<()> {
        let unique = dedup_items(items);
        let total = unique.len();
        builder.set_total(total);
        progress.on_run_start(total);
        if unique.is_empty() {
            return Ok(());
        }

        self.fs.create_dir_all(&self.config.output_dir).await?;

        let mut done = record.downloaded_set();
        let delay = self.config.rate_limit();
        let mut attempts = 0usize;

        for (idx, item) in unique.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if done.contains(&item.source_url) {
                builder.add_skipped();
                progress.on_skipped(item);
                continue;
            }

            let position = idx + 1;
            progress.on_item_start(position, total, item);
            let result = self.download_item(item, position).await;

            match &result.outcome {
                DownloadOutcome::Success { bytes } => {
                    record.mark_downloaded(&item.source_url);
                    done.insert(item.source_url.clone());
                    builder.add_download(*bytes);
                }
                DownloadOutcome::Failure { reason } => {
                    log::debug!("{} failed: {reason}", item.source_url);
                    record.mark_failed(&item.title, &item.source_url);
                    builder.add_failure();
                }
            }
            progress.on_item_finished(&result);

            attempts += 1;
            if self.config.checkpoint_every > 0 && attempts % self.config.checkpoint_every == 0 {
                self.store.save(record).map_err(Error::Checkpoint)?;
                progress.on_checkpoint(attempts);
            }

            // The delay follows every attempt regardless of outcome.
            if idx + 1 < total {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                }
            }
        }

        Ok(())
    }
}
