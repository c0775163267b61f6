//! Stream resolution: watch page id → direct, time-limited media URL.
//!
//! The pipeline depends only on [`StreamResolver`]. [`BrowserStreamResolver`]
//! drives a real browser through the player frame; tests use fakes.

mod browser;
mod extract;

pub use browser::BrowserStreamResolver;
pub use extract::{expiry_from_url, AttributeProbe, SelectorContract};

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::catalog::EpisodeRef;
use crate::control::RunControl;

/// A resolved media URL plus the request headers it needs.
///
/// Treat it as a capability for a single download attempt: it may expire
/// before use, which is an expected failure.
#[derive(Debug, Clone)]
pub struct ResolvedStream {
    pub episode: EpisodeRef,
    pub media_url: String,
    /// Present when the URL carries an expiry timestamp.
    pub expires_at: Option<SystemTime>,
    /// Minimal headers required to fetch `media_url` (e.g. `Referer`).
    pub headers: HashMap<String, String>,
}

impl ResolvedStream {
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    pub fn referer(&self) -> Option<&str> {
        self.headers.get("Referer").map(String::as_str)
    }
}

/// Per-attempt resolution failure. Each variant is a distinct failure mode so
/// the retry policy can treat them differently.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The page did not finish loading in time.
    #[error("navigation to {url} timed out after {}ms", timeout.as_millis())]
    NavigationTimeout { url: String, timeout: Duration },
    /// The page loaded but the player frame never appeared.
    #[error("player frame `{selector}` not found on {url}")]
    FrameNotFound { url: String, selector: String },
    /// The frame loaded but no media URL could be located in it.
    #[error("media url extraction failed: {0}")]
    ExtractionFailed(String),
    /// Browser launch or command failure.
    #[error("browser session error: {0}")]
    SessionError(String),
    #[error("resolution cancelled")]
    Cancelled,
}

/// Resolves one episode at a time. `&mut self` keeps a single logical
/// resolution attempt in flight per resolver.
#[async_trait]
pub trait StreamResolver: Send {
    async fn resolve(
        &mut self,
        episode: &EpisodeRef,
        timeout: Duration,
        control: &RunControl,
    ) -> Result<ResolvedStream, ResolveError>;
}
