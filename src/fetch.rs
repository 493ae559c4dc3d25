//! Single-resource downloads through the page session.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::session::PageSession;

/// Outcome of one fetch. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The server answered 2xx with this body.
    Success(Bytes),
    /// The server answered with a non-2xx status.
    Status(u16),
    /// The request failed below HTTP (timeout, reset, decode error).
    Transport(String),
}

impl FetchOutcome {
    /// Returns true for [`FetchOutcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Describes a failed outcome for logs and progress output.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Success(_) => None,
            Self::Status(code) => Some(format!("HTTP {code}")),
            Self::Transport(e) => Some(e.clone()),
        }
    }
}

/// Downloads a single resource. Implementations do not retry.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// [`Fetcher`] that goes through a [`PageSession`]'s network context.
#[derive(Clone)]
pub struct SessionFetcher {
    session: Arc<dyn PageSession>,
}

impl SessionFetcher {
    #[must_use]
    pub fn new(session: Arc<dyn PageSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Fetcher for SessionFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        match self.session.authenticated_fetch(url).await {
            Ok(response) if response.is_success() => FetchOutcome::Success(response.body),
            Ok(response) => {
                log::warn!("Failed to download {url}: HTTP {}", response.status);
                FetchOutcome::Status(response.status)
            }
            Err(e) => {
                log::warn!("Error downloading {url}: {e}");
                FetchOutcome::Transport(e.to_string())
            }
        }
    }
}
