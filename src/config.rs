//! Configuration types for scrape runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for a scrape run.
///
/// Every field has a default, so a config file only needs to name the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Listing page to render and extract items from.
    pub base_url: String,
    /// Directory where downloaded images are written.
    pub output_dir: PathBuf,
    /// JSON file holding download progress across runs.
    pub progress_file: PathBuf,
    /// Where the rendered page is dumped when nothing could be extracted.
    pub debug_dump: PathBuf,
    /// Minimum delay between two download attempts, in milliseconds.
    pub rate_limit_ms: u64,
    /// Number of resolved attempts between progress checkpoints.
    pub checkpoint_every: usize,
    /// Substring an image URL must contain to be considered an item.
    pub folder_marker: String,
    /// Timeout for the initial page load, in seconds.
    pub render_timeout_secs: u64,
    /// Timeout for a single image request, in seconds.
    pub fetch_timeout_secs: u64,
    /// How long to wait for the page to pass its bot check, in seconds.
    pub ready_timeout_secs: u64,
    /// Interval between readiness polls, in seconds.
    pub ready_poll_secs: u64,
    /// Extra settle time after the page reports ready, in milliseconds.
    pub settle_ms: u64,
    /// Wait after clicking the "ALL" tab, in milliseconds.
    pub tab_settle_ms: u64,
    /// Strings that must all be present for the page to count as loaded.
    pub ready_markers: Vec<String>,
    /// Strings (matched case-insensitively) that indicate a challenge page.
    pub challenge_markers: Vec<String>,
    /// User agent presented by the page session.
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rec0ded88.com/play-nes-games/".to_string(),
            output_dir: PathBuf::from("box-art"),
            progress_file: PathBuf::from("progress.json"),
            debug_dump: PathBuf::from("debug_page.html"),
            rate_limit_ms: 340,
            checkpoint_every: 10,
            folder_marker: "NES_Covers".to_string(),
            render_timeout_secs: 60,
            fetch_timeout_secs: 30,
            ready_timeout_secs: 30,
            ready_poll_secs: 2,
            settle_ms: 3000,
            tab_settle_ms: 2000,
            ready_markers: vec!["Play NES Games".to_string(), "10-Yard".to_string()],
            challenge_markers: vec!["challenge".to_string(), "checking".to_string()],
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScrapeConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the default config file location (`<config dir>/boxart-dl/config.toml`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("boxart-dl")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&contents).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the inter-request delay.
    #[must_use]
    pub const fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    /// Returns the page load timeout.
    #[must_use]
    pub const fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    /// Returns the per-image request timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Sets the listing page URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the progress file path.
    #[must_use]
    pub fn with_progress_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.progress_file = path.into();
        self
    }

    /// Sets the delay between download attempts.
    #[must_use]
    pub const fn with_rate_limit_ms(mut self, ms: u64) -> Self {
        self.rate_limit_ms = ms;
        self
    }

    /// Sets how many resolved attempts pass between checkpoints.
    #[must_use]
    pub const fn with_checkpoint_every(mut self, every: usize) -> Self {
        self.checkpoint_every = every;
        self
    }
}
