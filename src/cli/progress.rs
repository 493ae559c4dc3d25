//! Console reporting for scrape runs.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{DownloadProgress, DownloadResult, RunSummary, WorkItem};

const SEPARATOR: &str = "============================================================";
const RULE: &str = "------------------------------------------------------------";
const TITLE_WIDTH: usize = 40;

/// Cuts `title` to the column width, on a character boundary.
fn truncate_title(title: &str) -> String {
    title.chars().take(TITLE_WIDTH).collect()
}

/// Formats the per-item tally line, e.g. `[3/120] Contra            ✓`.
pub fn item_line(position: usize, total: usize, title: &str, ok: bool) -> String {
    let mark = if ok {
        style("✓").green().to_string()
    } else {
        style("✗").red().to_string()
    };
    format!(
        "[{position}/{total}] {:<width$} {mark}",
        truncate_title(title),
        width = TITLE_WIDTH
    )
}

/// Formats a duration as e.g. "42.3s" or "3m 07s".
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

/// Formats a byte count in KiB/MiB.
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Progress reporter printing one line per attempted item under a bar.
pub struct ConsoleProgress {
    bar: ProgressBar,
    current: Mutex<Option<(usize, usize)>>,
    last_summary: Mutex<Option<RunSummary>>,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleProgress {
    /// Creates a reporter with a hidden bar; the bar appears on run start.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            current: Mutex::new(None),
            last_summary: Mutex::new(None),
        }
    }

    /// Returns the summary reported when the last run ended.
    #[must_use]
    pub fn last_summary(&self) -> Option<RunSummary> {
        self.last_summary.lock().ok().and_then(|s| s.clone())
    }
}

impl DownloadProgress for ConsoleProgress {
    fn on_run_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .expect("progress template is valid")
            .progress_chars("━━╌"),
        );
        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stdout());
        self.bar.enable_steady_tick(Duration::from_millis(250));
    }

    fn on_skipped(&self, _item: &WorkItem) {
        self.bar.inc(1);
    }

    fn on_item_start(&self, position: usize, total: usize, item: &WorkItem) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some((position, total));
        }
        self.bar.set_message(truncate_title(&item.title));
    }

    fn on_item_finished(&self, result: &DownloadResult) {
        let (position, total) = self
            .current
            .lock()
            .ok()
            .and_then(|c| *c)
            .unwrap_or((0, 0));
        let line = item_line(position, total, &result.item.title, result.is_success());
        // A hidden bar (stdout not a terminal) swallows println.
        if self.bar.is_hidden() {
            println!("{line}");
        } else {
            self.bar.println(line);
        }
        self.bar.inc(1);
    }

    fn on_checkpoint(&self, attempts: usize) {
        log::debug!("Progress saved after {attempts} attempts");
    }

    fn on_run_end(&self, summary: &RunSummary) {
        self.bar.finish_and_clear();
        if let Ok(mut last) = self.last_summary.lock() {
            *last = Some(summary.clone());
        }
    }
}

/// Prints the banner shown before anything else.
pub fn print_header(already_downloaded: usize, output_dir: &Path) {
    println!("{SEPARATOR}");
    println!("NES Box Art Scraper");
    println!("{SEPARATOR}");
    println!("Previously downloaded: {already_downloaded} images");
    println!("Output directory: {}", output_dir.display());
    println!();
}

/// Prints the line introducing the download phase.
pub fn print_download_start(rate_limit: Duration) {
    println!();
    println!(
        "Starting downloads (one request every {}ms)...",
        rate_limit.as_millis()
    );
    println!("{RULE}");
}

/// Prints the final summary block.
pub fn print_summary(summary: &RunSummary, output_dir: &Path, interrupted: bool) {
    println!();
    println!("{SEPARATOR}");
    if interrupted {
        println!("{}", style("INTERRUPTED").yellow().bold());
    } else {
        println!("{}", style("COMPLETE").green().bold());
    }
    println!("{SEPARATOR}");
    println!("Downloaded: {}", summary.downloaded);
    println!("Skipped (already had): {}", summary.skipped);
    println!("Failed: {}", summary.failed);
    println!("Total games found: {}", summary.total);
    println!("Bytes written: {}", format_size(summary.bytes));
    println!("Elapsed: {}", format_elapsed(summary.elapsed));
    println!("Output directory: {}", output_dir.display());
}
