//! Download stage of one episode: attempts, backoff and expiry hand-back.
//!
//! Runs either inline or in a spawned task (pipelined mode), so everything it
//! needs is owned. It never touches the resolver; an expired link is handed
//! back to the orchestrator for re-resolution.

use std::path::PathBuf;
use std::sync::Arc;

use super::events::{EventSink, PipelineEvent};
use crate::control::RunControl;
use crate::download::{DownloadError, DownloadExecutor, DownloadTarget};
use crate::resolver::ResolvedStream;
use crate::retry::{classify_download, ErrorKind, RetryDecision, RetryPolicy, Stage};

#[derive(Clone)]
pub(crate) struct DownloadContext {
    pub executor: Arc<dyn DownloadExecutor>,
    pub target: DownloadTarget,
    pub control: RunControl,
    pub policy: RetryPolicy,
    pub events: EventSink,
}

#[derive(Debug)]
pub(crate) enum DownloadOutcome {
    Downloaded(PathBuf),
    /// Terminal failure (not retryable or budget exhausted).
    Failed(DownloadError),
    /// The link expired; backoff already slept. Needs a fresh resolution.
    Expired(DownloadError),
    Cancelled,
}

/// Attempts the download until success, a terminal failure, an expired link
/// (when `can_re_resolve`) or cancellation. `attempts` is the episode's
/// running download attempt count.
pub(crate) async fn download_with_retry(
    ctx: &DownloadContext,
    stream: &ResolvedStream,
    attempts: &mut u32,
    can_re_resolve: bool,
) -> DownloadOutcome {
    let index = stream.episode.index;
    let re_resolve = can_re_resolve && ctx.policy.re_resolve_on_expiry;
    loop {
        if ctx.control.is_cancelled() {
            return DownloadOutcome::Cancelled;
        }
        if re_resolve && stream.is_expired() {
            tracing::debug!(episode = index, "resolved link expired before download");
            return DownloadOutcome::Expired(DownloadError::expired(
                "resolved link expired before download",
            ));
        }

        *attempts += 1;
        ctx.events.emit(PipelineEvent::DownloadStarted {
            index,
            attempt: *attempts,
        });
        tracing::debug!(episode = index, attempt = *attempts, "download attempt");

        let err = match ctx
            .executor
            .download(stream, &ctx.target, &ctx.control)
            .await
        {
            Ok(path) => return DownloadOutcome::Downloaded(path),
            Err(e) => e,
        };

        let kind = classify_download(&err);
        if kind == ErrorKind::Cancelled {
            return DownloadOutcome::Cancelled;
        }
        if kind == ErrorKind::Expired && !re_resolve {
            return DownloadOutcome::Failed(err);
        }
        match ctx.policy.decide(Stage::Download, *attempts, kind) {
            RetryDecision::NoRetry => return DownloadOutcome::Failed(err),
            RetryDecision::RetryAfter(delay) => {
                tracing::warn!(
                    episode = index,
                    attempt = *attempts,
                    error = %err,
                    "download attempt failed, retrying in {:?}",
                    delay
                );
                ctx.events.emit(PipelineEvent::AttemptFailed {
                    index,
                    stage: Stage::Download,
                    attempt: *attempts,
                    error: err.to_string(),
                    retry_in: delay,
                });
                if ctx.control.sleep(delay).await.is_err() {
                    return DownloadOutcome::Cancelled;
                }
                if kind == ErrorKind::Expired {
                    return DownloadOutcome::Expired(err);
                }
            }
        }
    }
}
