//! boxart-dl - resumable, rate-limited cover art downloader.
//!
//! The library renders a listing page through a [`PageSession`], extracts
//! `(title, url)` pairs for its cover images, and downloads each image
//! exactly once. Completed URLs are recorded in a JSON progress file, so an
//! interrupted run picks up where it stopped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use boxart_dl::{
//!     Downloader, HttpSession, JsonProgressStore, NoProgress, PageSession, ProgressStore,
//!     ScrapeConfig, SessionFetcher, WorkItem,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> boxart_dl::Result<()> {
//! let config = ScrapeConfig::default();
//! let session: Arc<dyn PageSession> = Arc::new(HttpSession::new(&config)?);
//! session.render(&config.base_url, config.render_timeout()).await?;
//!
//! let store = JsonProgressStore::new(&config.progress_file);
//! let mut record = store.load()?;
//!
//! let items = vec![WorkItem::new("Contra", "https://example.com/NES_Covers/Contra.png")];
//! let downloader = Downloader::new(SessionFetcher::new(session), store, config);
//! let summary = downloader
//!     .run(&items, &mut record, &NoProgress, &CancellationToken::new())
//!     .await?;
//! println!("Downloaded {} of {}", summary.downloaded, summary.total);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fs;
pub mod sanitize;
pub mod session;
pub mod state;
pub mod stats;

// Re-export main types for convenience
pub use config::ScrapeConfig;
pub use download::{
    DownloadOutcome, DownloadProgress, DownloadResult, Downloader, NoProgress, WorkItem,
    dedup_items,
};
pub use error::{Error, Result};
pub use extract::ImageExtractor;
pub use fetch::{FetchOutcome, Fetcher, SessionFetcher};
pub use fs::{FileSystem, TokioFileSystem};
pub use sanitize::{extension_of, item_stem, sanitize_filename};
pub use session::{FetchResponse, HttpSession, PageSession, Readiness, wait_until_ready};
pub use state::{FailedEntry, JsonProgressStore, ProgressRecord, ProgressStore};
pub use stats::{RunSummary, SummaryBuilder};
