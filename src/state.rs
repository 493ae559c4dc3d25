//! Download progress persistence for resume support.
//!
//! Progress is a small JSON document listing every URL that has been saved
//! and every attempt that failed:
//!
//! ```json
//! {
//!   "downloaded": ["https://example.com/covers/contra.png"],
//!   "failed": [{ "title": "Duck Hunt", "url": "https://example.com/covers/duck-hunt.png" }]
//! }
//! ```
//!
//! Only `downloaded` decides whether an item is skipped. Failed entries are
//! kept for the operator and are retried on the next run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A failed download attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub title: String,
    pub url: String,
}

/// Persistent record of completed and failed downloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Source URLs saved to disk, in completion order.
    pub downloaded: Vec<String>,
    /// Failed attempts, in the order they happened.
    pub failed: Vec<FailedEntry>,
}

impl ProgressRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the downloaded URLs as a set for membership checks.
    #[must_use]
    pub fn downloaded_set(&self) -> HashSet<String> {
        self.downloaded.iter().cloned().collect()
    }

    /// Records a successful download. Already-recorded URLs are not repeated.
    pub fn mark_downloaded(&mut self, url: &str) {
        if !self.downloaded.iter().any(|u| u == url) {
            self.downloaded.push(url.to_string());
        }
    }

    /// Records a failed attempt.
    pub fn mark_failed(&mut self, title: &str, url: &str) {
        self.failed.push(FailedEntry {
            title: title.to_string(),
            url: url.to_string(),
        });
    }

    /// Returns true if `url` has been downloaded.
    #[must_use]
    pub fn is_downloaded(&self, url: &str) -> bool {
        self.downloaded.iter().any(|u| u == url)
    }
}

/// Durable storage for a [`ProgressRecord`].
pub trait ProgressStore: Send + Sync {
    /// Loads the stored record, or an empty one if nothing is stored yet.
    ///
    /// # Errors
    ///
    /// Returns an error if stored state exists but cannot be read or parsed.
    fn load(&self) -> Result<ProgressRecord>;

    /// Replaces the stored record with `record`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn save(&self, record: &ProgressRecord) -> std::io::Result<()>;
}

/// Progress store backed by a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonProgressStore {
    path: PathBuf,
}

impl JsonProgressStore {
    /// Creates a store that reads and writes `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the progress file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ProgressStore for JsonProgressStore {
    fn load(&self) -> Result<ProgressRecord> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProgressRecord::new());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents).map_err(|source| Error::CorruptProgress {
            path: self.path.clone(),
            source,
        })
    }

    /// Saves the record atomically (write tmp + rename).
    fn save(&self, record: &ProgressRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        log::debug!(
            "Saved progress to {} ({} downloaded, {} failed)",
            self.path.display(),
            record.downloaded.len(),
            record.failed.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record() -> ProgressRecord {
        let mut record = ProgressRecord::new();
        record.mark_downloaded("https://x.com/covers/contra.png");
        record.mark_failed("Duck Hunt", "https://x.com/covers/duck-hunt.png");
        record
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::new(dir.path().join("progress.json"));
        let record = store.load().unwrap();
        assert!(record.downloaded.is_empty());
        assert!(record.failed.is_empty());
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::new(dir.path().join("progress.json"));
        let record = sample_record();

        store.save(&record).unwrap();
        assert_eq!(store.load().unwrap(), record);
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn save_overwrites_previous_state() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::new(dir.path().join("progress.json"));
        store.save(&sample_record()).unwrap();

        let mut next = ProgressRecord::new();
        next.mark_downloaded("https://x.com/covers/zelda.png");
        store.save(&next).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.downloaded, vec!["https://x.com/covers/zelda.png"]);
        assert!(loaded.failed.is_empty());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::new(dir.path().join("state/nested/progress.json"));
        store.save(&sample_record()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn saved_file_uses_expected_layout() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgressStore::new(dir.path().join("progress.json"));
        store.save(&sample_record()).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["downloaded"][0], "https://x.com/covers/contra.png");
        assert_eq!(value["failed"][0]["title"], "Duck Hunt");
        assert_eq!(value["failed"][0]["url"], "https://x.com/covers/duck-hunt.png");
        // Indented, human-readable output
        assert!(raw.contains("\n  \"downloaded\""));
    }

    #[test]
    fn load_accepts_hand_written_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(
            &path,
            r#"{"downloaded": ["u1", "u2"], "failed": [{"title": "A", "url": "u3"}]}"#,
        )
        .unwrap();

        let record = JsonProgressStore::new(&path).load().unwrap();
        assert_eq!(record.downloaded, vec!["u1", "u2"]);
        assert_eq!(record.failed[0].url, "u3");
    }

    #[test]
    fn corrupt_file_is_fatal_and_left_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, "{\"downloaded\": [").unwrap();

        let store = JsonProgressStore::new(&path);
        assert!(matches!(store.load(), Err(Error::CorruptProgress { .. })));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"downloaded\": [");
    }

    #[test]
    fn missing_field_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, r#"{"downloaded": []}"#).unwrap();

        let store = JsonProgressStore::new(&path);
        assert!(matches!(store.load(), Err(Error::CorruptProgress { .. })));
    }

    #[test]
    fn mark_downloaded_ignores_duplicates() {
        let mut record = ProgressRecord::new();
        record.mark_downloaded("u1");
        record.mark_downloaded("u2");
        record.mark_downloaded("u1");
        assert_eq!(record.downloaded, vec!["u1", "u2"]);
        assert!(record.is_downloaded("u2"));
        assert_eq!(record.downloaded_set().len(), 2);
    }

    #[test]
    fn failed_entries_do_not_count_as_downloaded() {
        let mut record = ProgressRecord::new();
        record.mark_failed("A", "u1");
        record.mark_failed("A", "u1");
        assert_eq!(record.failed.len(), 2);
        assert!(!record.is_downloaded("u1"));
    }
}
