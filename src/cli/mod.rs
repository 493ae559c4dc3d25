//! CLI mode: render the listing page, extract cover images and download them.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::{
    Downloader, Error, HttpSession, ImageExtractor, JsonProgressStore, PageSession, ProgressStore,
    Readiness, ScrapeConfig, SessionFetcher, WorkItem, wait_until_ready,
};

pub use progress::ConsoleProgress;
use progress::{print_download_start, print_header, print_summary};

/// Command-line overrides on top of the config file. All optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub progress_file: Option<PathBuf>,
    pub base_url: Option<String>,
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(CliArgs),
    Help,
}

/// Prints usage information.
pub fn print_usage() {
    eprintln!("Usage: boxart [OPTIONS]");
    eprintln!();
    eprintln!("Downloads every cover image from the configured listing page,");
    eprintln!("skipping images recorded as downloaded by earlier runs.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>     Config file (default: <config dir>/boxart-dl/config.toml)");
    eprintln!("  -o, --output <DIR>      Output directory (default: box-art)");
    eprintln!("  -p, --progress <FILE>   Progress file (default: progress.json)");
    eprintln!("  -u, --url <URL>         Listing page to scrape");
    eprintln!("  -h, --help              Show this help");
}

/// Parses command-line arguments (without the program name).
///
/// # Errors
///
/// Returns a message for unknown options or options missing their value.
pub fn parse_args<I>(args: I) -> std::result::Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .ok_or_else(|| format!("{name} requires a value"))
        };
        match arg.as_str() {
            "-c" | "--config" => parsed.config_path = Some(PathBuf::from(value(arg.as_str())?)),
            "-o" | "--output" => parsed.output_dir = Some(PathBuf::from(value(arg.as_str())?)),
            "-p" | "--progress" => parsed.progress_file = Some(PathBuf::from(value(arg.as_str())?)),
            "-u" | "--url" => parsed.base_url = Some(value(arg.as_str())?),
            "-h" | "--help" => return Ok(Command::Help),
            other => return Err(format!("Unknown option: {other}")),
        }
    }

    Ok(Command::Run(parsed))
}

impl CliArgs {
    /// Loads the config file and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but is invalid.
    pub fn into_config(self) -> crate::Result<ScrapeConfig> {
        let path = self.config_path.unwrap_or_else(ScrapeConfig::default_path);
        let mut config = ScrapeConfig::load(&path)?;
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(file) = self.progress_file {
            config.progress_file = file;
        }
        if let Some(url) = self.base_url {
            config.base_url = url;
        }
        Ok(config)
    }
}

/// Clicks the listing's "ALL" tab, if there is one. Evaluates to whether it did.
const CLICK_ALL_TAB: &str = r"(() => {
    const tab = Array.from(document.querySelectorAll('a'))
        .find((a) => a.textContent.trim() === 'ALL');
    if (!tab) return false;
    tab.click();
    return true;
})()";

/// Scrolls the page, logging instead of failing.
async fn scroll(session: &dyn PageSession) {
    if let Err(e) = session.scroll_and_wait().await {
        log::warn!("Scrolling failed, continuing with current content: {e}");
    }
}

/// Renders the listing page and extracts its items.
///
/// Returns the items together with the page content they came from.
///
/// # Errors
///
/// Returns an error if the base URL is invalid or the page cannot be loaded.
pub async fn discover_items(
    session: &dyn PageSession,
    config: &ScrapeConfig,
) -> crate::Result<(Vec<WorkItem>, String)> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| Error::Render(format!("invalid base URL {}: {e}", config.base_url)))?;

    let first = session.render(&config.base_url, config.render_timeout()).await?;

    println!("Waiting for the page to pass its bot check...");
    wait_until_ready(session, &Readiness::from_config(config)).await;
    tokio::time::sleep(Duration::from_millis(config.settle_ms)).await;

    println!("Scrolling to load all content...");
    scroll(session).await;

    match session.evaluate_script(CLICK_ALL_TAB).await {
        Ok(serde_json::Value::Bool(true)) => {
            log::info!("Clicked ALL tab");
            tokio::time::sleep(Duration::from_millis(config.tab_settle_ms)).await;
            scroll(session).await;
        }
        Ok(_) => log::info!("No ALL tab on the page"),
        Err(e) => log::info!("Could not click ALL tab: {e}"),
    }

    let html = match session.content().await {
        Ok(html) => html,
        Err(e) => {
            log::warn!("Could not re-read page, using first render: {e}");
            first
        }
    };

    println!("Extracting game list...");
    let items = ImageExtractor::new(base, config.folder_marker.clone()).extract(&html);
    Ok((items, html))
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => log::info!("Received SIGINT"),
                    _ = sigterm.recv() => log::info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                log::warn!("Could not listen for SIGTERM: {e}");
                tokio::signal::ctrl_c().await.ok();
                log::info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        log::info!("Received SIGINT");
    }
}

/// Runs one scrape: discover items, then download what is missing.
///
/// # Errors
///
/// Returns an error if the config or progress file is invalid, the page
/// cannot be loaded, or a checkpoint cannot be written. Finding no items is
/// not an error.
pub async fn run(args: CliArgs) -> crate::Result<()> {
    let config = args.into_config()?;
    tokio::fs::create_dir_all(&config.output_dir).await?;

    let store = JsonProgressStore::new(&config.progress_file);
    let mut record = store.load()?;
    print_header(record.downloaded.len(), &config.output_dir);

    let session: Arc<dyn PageSession> = Arc::new(HttpSession::new(&config)?);
    let (items, html) = discover_items(session.as_ref(), &config).await?;
    println!("Found {} games", items.len());

    if items.is_empty() {
        log::error!("No games found, the page structure may have changed");
        match tokio::fs::write(&config.debug_dump, &html).await {
            Ok(()) => println!("Saved page to {} for debugging", config.debug_dump.display()),
            Err(e) => log::warn!("Could not save {}: {e}", config.debug_dump.display()),
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let output_dir = config.output_dir.clone();
    let rate_limit = config.rate_limit();
    let downloader = Downloader::new(SessionFetcher::new(Arc::clone(&session)), store, config);
    let reporter = ConsoleProgress::new();

    print_download_start(rate_limit);
    match downloader.run(&items, &mut record, &reporter, &cancel).await {
        Ok(summary) => {
            print_summary(&summary, &output_dir, false);
            Ok(())
        }
        Err(Error::Cancelled) => {
            if let Some(summary) = reporter.last_summary() {
                print_summary(&summary, &output_dir, true);
            }
            println!(
                "Progress saved to {}; run again to resume.",
                downloader.store().path().display()
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Run stopped: {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FetchResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> std::result::Result<Command, String> {
        parse_args(list.iter().map(ToString::to_string))
    }

    #[test]
    fn no_arguments_is_a_plain_run() {
        assert_eq!(args(&[]), Ok(Command::Run(CliArgs::default())));
    }

    #[test]
    fn options_are_parsed() {
        let parsed = args(&["-o", "covers", "--progress", "p.json", "-u", "https://x.com/"]).unwrap();
        assert_eq!(
            parsed,
            Command::Run(CliArgs {
                config_path: None,
                output_dir: Some(PathBuf::from("covers")),
                progress_file: Some(PathBuf::from("p.json")),
                base_url: Some("https://x.com/".to_string()),
            })
        );
    }

    #[test]
    fn help_and_errors() {
        assert_eq!(args(&["--help"]), Ok(Command::Help));
        assert!(args(&["--output"]).unwrap_err().contains("requires a value"));
        assert!(args(&["--frobnicate"]).unwrap_err().contains("Unknown option"));
    }

    #[test]
    fn overrides_win_over_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "output_dir = \"from-file\"\nrate_limit_ms = 500\n").unwrap();

        let config = CliArgs {
            config_path: Some(path),
            output_dir: Some(PathBuf::from("from-cli")),
            ..CliArgs::default()
        }
        .into_config()
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("from-cli"));
        assert_eq!(config.rate_limit_ms, 500);
    }

    /// Session serving a fixed page and recording the calls made on it.
    struct StaticPage {
        html: &'static str,
        tab: Option<bool>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl StaticPage {
        /// `tab` is what clicking the ALL tab evaluates to; `None` means the
        /// session cannot run scripts.
        fn new(html: &'static str, tab: Option<bool>) -> Self {
            Self {
                html,
                tab,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSession for StaticPage {
        async fn render(&self, _url: &str, _timeout: Duration) -> crate::Result<String> {
            self.record("render");
            Ok(self.html.to_string())
        }

        async fn content(&self) -> crate::Result<String> {
            self.record("content");
            Ok(self.html.to_string())
        }

        async fn scroll_and_wait(&self) -> crate::Result<()> {
            self.record("scroll");
            Ok(())
        }

        async fn evaluate_script(&self, script: &str) -> crate::Result<serde_json::Value> {
            self.record("evaluate");
            assert!(script.contains("'ALL'"));
            self.tab
                .map(serde_json::Value::Bool)
                .ok_or(Error::Unsupported("script evaluation"))
        }

        async fn authenticated_fetch(&self, _url: &str) -> crate::Result<FetchResponse> {
            Err(Error::Unsupported("fetch"))
        }
    }

    fn quick_config() -> ScrapeConfig {
        ScrapeConfig {
            settle_ms: 0,
            tab_settle_ms: 0,
            ready_timeout_secs: 0,
            ..ScrapeConfig::default()
        }
    }

    #[tokio::test]
    async fn discover_items_extracts_from_rendered_page() {
        let page = StaticPage::new(
            r#"<h1>Play NES Games</h1><img src="/NES_Covers/10-Yard-Fight-USA.png" alt="10-Yard Fight">"#,
            None,
        );
        let (items, html) = discover_items(&page, &quick_config()).await.unwrap();
        assert_eq!(
            items,
            vec![WorkItem::new(
                "10-Yard Fight",
                "https://rec0ded88.com/NES_Covers/10-Yard-Fight-USA.png"
            )]
        );
        assert!(html.contains("Play NES Games"));
    }

    #[tokio::test]
    async fn discover_items_rejects_invalid_base_url() {
        let config = ScrapeConfig {
            base_url: "not a url".to_string(),
            ..quick_config()
        };
        let result = discover_items(&StaticPage::new("", None), &config).await;
        assert!(matches!(result, Err(Error::Render(_))));
    }

    #[tokio::test]
    async fn clicking_all_tab_triggers_second_scroll() {
        let page = StaticPage::new("<h1>Play NES Games</h1>", Some(true));
        discover_items(&page, &quick_config()).await.unwrap();
        assert_eq!(
            page.calls(),
            vec!["render", "scroll", "evaluate", "scroll", "content"]
        );
    }

    #[tokio::test]
    async fn missing_or_unsupported_tab_is_tolerated() {
        for tab in [Some(false), None] {
            let page = StaticPage::new(
                r#"<img src="/NES_Covers/Contra-USA.png" alt="Contra">"#,
                tab,
            );
            let (items, _) = discover_items(&page, &quick_config()).await.unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(page.calls(), vec!["render", "scroll", "evaluate", "content"]);
        }
    }
}
