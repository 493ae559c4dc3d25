//! Error types for the boxart-dl library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can stop a scrape run.
///
/// Per-item download failures are not represented here; they are reported
/// through [`FetchOutcome`](crate::fetch::FetchOutcome) and counted in the
/// run summary instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error from the page session.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The progress file exists but could not be parsed.
    #[error("progress file {} is corrupt: {source}", path.display())]
    CorruptProgress {
        /// Path to the unreadable progress file.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// The configuration file could not be parsed.
    #[error("invalid config {}: {source}", path.display())]
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },

    /// The page renderer failed to produce content.
    #[error("render failed: {0}")]
    Render(String),

    /// The page session backend does not provide a capability.
    #[error("unsupported by this page session: {0}")]
    Unsupported(&'static str),

    /// A periodic progress checkpoint could not be written.
    #[error("checkpoint failed: {0}")]
    Checkpoint(std::io::Error),

    /// The run was interrupted before all items were processed.
    #[error("run cancelled")]
    Cancelled,
}

/// A specialized `Result` type for boxart-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
