//! Page session: the capability the scraper needs from a page renderer.
//!
//! The listing page sits behind a bot check, so every request after the
//! first page load has to go through the same session that passed it.
//! [`PageSession`] captures that boundary; [`HttpSession`] is a plain HTTP
//! implementation that keeps cookies between the page load and the image
//! requests. A browser-automation backend can implement the same trait.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::REFERER;

use crate::config::ScrapeConfig;
use crate::error::{Error, Result};

/// Raw response to a request made inside the page session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
}

impl FetchResponse {
    /// Returns true for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A rendered page and the network context that loaded it.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigates to `url` and returns the page content.
    async fn render(&self, url: &str, timeout: Duration) -> Result<String>;

    /// Returns the current content of the rendered page.
    async fn content(&self) -> Result<String>;

    /// Scrolls through the page so lazily loaded content appears.
    async fn scroll_and_wait(&self) -> Result<()>;

    /// Evaluates a script in the page and returns its JSON result.
    async fn evaluate_script(&self, script: &str) -> Result<serde_json::Value>;

    /// Fetches `url` with the session's cookies and origin.
    async fn authenticated_fetch(&self, url: &str) -> Result<FetchResponse>;
}

/// [`PageSession`] over a cookie-carrying `reqwest` client.
///
/// There is no script engine, so `evaluate_script` is unsupported and
/// `scroll_and_wait` returns immediately: the whole page is already in the
/// response body.
pub struct HttpSession {
    client: reqwest::Client,
    current: Mutex<Option<(String, Duration)>>,
    fetch_timeout: Duration,
}

impl HttpSession {
    /// Builds a session using the user agent and fetch timeout from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            current: Mutex::new(None),
            fetch_timeout: config.fetch_timeout(),
        })
    }

    fn current_page(&self) -> Option<(String, Duration)> {
        self.current.lock().ok().and_then(|guard| guard.clone())
    }

    async fn get_page(&self, url: &str, timeout: Duration) -> Result<String> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() || status.as_u16() == 403 || status.as_u16() == 503 {
            // Challenge pages come back as 403/503 with a body worth polling.
            Ok(body)
        } else {
            Err(Error::Render(format!("{url} returned HTTP {status}")))
        }
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        log::info!("Navigating to {url}");
        let body = self.get_page(url, timeout).await?;
        if let Ok(mut guard) = self.current.lock() {
            *guard = Some((url.to_string(), timeout));
        }
        Ok(body)
    }

    async fn content(&self) -> Result<String> {
        let (url, timeout) = self
            .current_page()
            .ok_or_else(|| Error::Render("no page has been rendered".to_string()))?;
        self.get_page(&url, timeout).await
    }

    async fn scroll_and_wait(&self) -> Result<()> {
        Ok(())
    }

    async fn evaluate_script(&self, _script: &str) -> Result<serde_json::Value> {
        Err(Error::Unsupported("script evaluation"))
    }

    async fn authenticated_fetch(&self, url: &str) -> Result<FetchResponse> {
        let mut request = self.client.get(url).timeout(self.fetch_timeout);
        if let Some((page_url, _)) = self.current_page() {
            request = request.header(REFERER, page_url);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(FetchResponse { status, body })
    }
}

/// Polling parameters for deciding when the page has passed its bot check.
#[derive(Debug, Clone)]
pub struct Readiness {
    /// All of these must appear in the page content.
    pub ready_markers: Vec<String>,
    /// Any of these (case-insensitive) means a challenge is still showing.
    pub challenge_markers: Vec<String>,
    /// Give up after this long.
    pub timeout: Duration,
    /// Delay between polls.
    pub poll: Duration,
}

impl Readiness {
    /// Takes the readiness settings from `config`.
    #[must_use]
    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self {
            ready_markers: config.ready_markers.clone(),
            challenge_markers: config.challenge_markers.clone(),
            timeout: Duration::from_secs(config.ready_timeout_secs),
            poll: Duration::from_secs(config.ready_poll_secs),
        }
    }

    fn is_ready(&self, content: &str) -> bool {
        self.ready_markers.iter().all(|m| content.contains(m.as_str()))
    }

    fn is_challenge(&self, content: &str) -> bool {
        let lower = content.to_lowercase();
        self.challenge_markers
            .iter()
            .any(|m| lower.contains(&m.to_lowercase()))
    }
}

/// Polls the session until the page looks loaded or the timeout passes.
///
/// Returns `false` on timeout; the caller decides whether the page is still
/// usable. Content errors during polling are logged and polling continues.
pub async fn wait_until_ready(session: &dyn PageSession, readiness: &Readiness) -> bool {
    let poll = readiness.poll.max(Duration::from_millis(1));
    let mut waited = Duration::ZERO;
    while waited < readiness.timeout {
        tokio::time::sleep(poll).await;
        waited += poll;

        let content = match session.content().await {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Could not read page content: {e}");
                continue;
            }
        };

        if readiness.is_ready(&content) {
            log::info!("Page loaded after {:.1}s", waited.as_secs_f64());
            return true;
        }
        if readiness.is_challenge(&content) {
            log::info!("Still waiting for bot check ({:.1}s)", waited.as_secs_f64());
        }
    }
    log::warn!("Page not ready after {:.1}s, continuing", readiness.timeout.as_secs_f64());
    false
}
