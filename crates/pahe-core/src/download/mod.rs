//! Download executors: take a [`ResolvedStream`] and write the media to disk.
//!
//! The orchestrator only sees [`DownloadExecutor`]. [`YtDlpExecutor`] shells
//! out to yt-dlp (HLS, merging, subtitles); [`DirectExecutor`] is a plain
//! single-stream GET for progressive files.

mod direct;
mod layout;
mod ytdlp;

pub use direct::DirectExecutor;
pub use layout::{sanitize_title, DownloadLayout, DEFAULT_TITLE};
pub use ytdlp::YtDlpExecutor;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{DownloadBackend, DownloadConfig};
use crate::control::RunControl;
use crate::resolver::ResolvedStream;

/// How a failed download attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFailureKind {
    /// Network hiccup, throttling, server 5xx. Worth retrying as-is.
    Transient,
    /// The media URL no longer works (403/410); needs a fresh resolution.
    Expired,
    /// Retrying will not help (bad URL, disk error, tool missing).
    Permanent,
    Cancelled,
}

impl fmt::Display for DownloadFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DownloadFailureKind::Transient => "transient",
            DownloadFailureKind::Expired => "expired",
            DownloadFailureKind::Permanent => "permanent",
            DownloadFailureKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A single failed download attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("download failed ({kind}): {message}")]
pub struct DownloadError {
    pub kind: DownloadFailureKind,
    pub message: String,
}

impl DownloadError {
    pub fn new(kind: DownloadFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(DownloadFailureKind::Transient, message)
    }

    pub fn expired(message: impl Into<String>) -> Self {
        Self::new(DownloadFailureKind::Expired, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(DownloadFailureKind::Permanent, message)
    }

    pub fn cancelled() -> Self {
        Self::new(DownloadFailureKind::Cancelled, "cancelled by user")
    }
}

/// Where one episode goes: `<dir>/<stem>.<ext>`. The executor picks `<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub dir: PathBuf,
    pub stem: String,
}

impl DownloadTarget {
    pub fn path_with_extension(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, ext))
    }

    /// Temporary file used while a transfer is in flight.
    pub fn partial_path(&self) -> PathBuf {
        self.dir.join(format!("{}.part", self.stem))
    }
}

/// Downloads one resolved stream. Each call is independent; implementations
/// keep no per-episode state between calls.
#[async_trait]
pub trait DownloadExecutor: Send + Sync {
    async fn download(
        &self,
        stream: &ResolvedStream,
        target: &DownloadTarget,
        control: &RunControl,
    ) -> Result<PathBuf, DownloadError>;
}

/// Builds the configured executor.
pub fn executor_from_config(cfg: &DownloadConfig) -> anyhow::Result<Arc<dyn DownloadExecutor>> {
    Ok(match cfg.backend {
        DownloadBackend::YtDlp => {
            let exec = match &cfg.ytdlp_path {
                Some(path) => YtDlpExecutor::new(path.clone()),
                None => YtDlpExecutor::from_path().ok_or_else(|| {
                    anyhow::anyhow!(
                        "yt-dlp not found in PATH; install it or set download.ytdlp_path \
                         (or use --backend direct)"
                    )
                })?,
            };
            Arc::new(exec)
        }
        DownloadBackend::Direct => Arc::new(DirectExecutor::new()),
    })
}
