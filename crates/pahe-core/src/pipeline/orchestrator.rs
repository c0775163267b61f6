//! The run loop.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::download::{download_with_retry, DownloadContext, DownloadOutcome};
use super::events::{EventSink, PipelineEvent};
use super::report::{EpisodeJobResult, JobStatus, RunReport};
use crate::catalog::EpisodeRef;
use crate::control::RunControl;
use crate::download::{DownloadError, DownloadExecutor, DownloadLayout};
use crate::resolver::{ResolveError, ResolvedStream, StreamResolver};
use crate::retry::{classify_resolve, ErrorKind, RetryDecision, RetryPolicy, Stage};
use crate::selection::EpisodeSelection;

/// Attempt bookkeeping of the episode in progress.
#[derive(Debug)]
struct JobState {
    episode: EpisodeRef,
    resolve_attempts: u32,
    download_attempts: u32,
    timeouts_seen: u32,
    last_error: Option<String>,
}

impl JobState {
    fn new(episode: EpisodeRef) -> Self {
        Self {
            episode,
            resolve_attempts: 0,
            download_attempts: 0,
            timeouts_seen: 0,
            last_error: None,
        }
    }

    fn finish(self, status: JobStatus, output: Option<PathBuf>) -> EpisodeJobResult {
        EpisodeJobResult {
            episode: self.episode,
            status,
            attempts: self.resolve_attempts + self.download_attempts,
            resolve_attempts: self.resolve_attempts,
            download_attempts: self.download_attempts,
            last_error: if status == JobStatus::Succeeded {
                None
            } else {
                self.last_error
            },
            output,
        }
    }
}

/// Why resolution stopped without a stream.
enum ResolveStop {
    Exhausted,
    Cancelled,
}

/// Resolution phase result of one episode.
enum Step {
    Finished(EpisodeJobResult),
    Resolved(JobState, ResolvedStream),
    Interrupted,
}

/// A download running in its own task.
struct PendingDownload {
    position: usize,
    job: JobState,
    handle: JoinHandle<(u32, DownloadOutcome)>,
}

/// Drives selected episodes through resolver and executor.
///
/// Owns the resolver for the run; only this task ever calls it, so at most
/// one browser session is in use at a time.
pub struct Orchestrator<R> {
    resolver: R,
    executor: Arc<dyn DownloadExecutor>,
    layout: DownloadLayout,
    control: RunControl,
    events: EventSink,
    pipelined: bool,
}

impl<R: StreamResolver> Orchestrator<R> {
    pub fn new(resolver: R, executor: Arc<dyn DownloadExecutor>, layout: DownloadLayout) -> Self {
        Self {
            resolver,
            executor,
            layout,
            control: RunControl::new(),
            events: EventSink::default(),
            pipelined: false,
        }
    }

    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    /// Overlap each download with the next episode's resolution.
    pub fn pipelined(mut self, enabled: bool) -> Self {
        self.pipelined = enabled;
        self
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Runs every selected episode in ascending order.
    ///
    /// Per-episode failures end up in the report; nothing here fails the run.
    /// Indices missing from `episodes` are recorded as `ResolutionFailed`.
    pub async fn run(
        &mut self,
        selection: &EpisodeSelection,
        episodes: &[EpisodeRef],
        policy: &RetryPolicy,
    ) -> RunReport {
        let indices = selection.to_vec();
        tracing::info!(
            episodes = indices.len(),
            selection = %selection,
            pipelined = self.pipelined,
            "pipeline run started"
        );

        let mut report = RunReport::default();
        let mut pending: Option<PendingDownload> = None;
        let mut stop_at: Option<usize> = None;

        for (position, &index) in indices.iter().enumerate() {
            if self.control.is_cancelled() {
                stop_at = Some(position);
                break;
            }

            let step = self.resolve_phase(index, episodes, policy).await;

            // The previous episode's result goes first.
            if let Some(prev) = pending.take() {
                if let Err(at) = self.settle(prev, policy, &mut report).await {
                    stop_at = Some(at);
                    break;
                }
            }

            match step {
                Step::Finished(result) => self.record(&mut report, result),
                Step::Interrupted => {
                    stop_at = Some(position);
                    break;
                }
                Step::Resolved(job, stream) => {
                    let download = self.spawn_download(position, job, stream, policy);
                    if self.pipelined {
                        pending = Some(download);
                    } else if let Err(at) = self.settle(download, policy, &mut report).await {
                        stop_at = Some(at);
                        break;
                    }
                }
            }
        }

        if let Some(prev) = pending.take() {
            if let Err(at) = self.settle(prev, policy, &mut report).await {
                stop_at = Some(at);
            }
        }

        if let Some(at) = stop_at {
            report.cancelled = true;
            report.not_attempted = indices[at..].to_vec();
            tracing::info!(
                finished = report.results.len(),
                not_attempted = report.not_attempted.len(),
                "pipeline run cancelled"
            );
        } else {
            tracing::info!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                "pipeline run finished"
            );
        }
        report
    }

    async fn resolve_phase(
        &mut self,
        index: u32,
        episodes: &[EpisodeRef],
        policy: &RetryPolicy,
    ) -> Step {
        let Some(episode) = episodes.iter().find(|e| e.index == index) else {
            tracing::warn!(episode = index, "selected episode not in catalog listing");
            return Step::Finished(EpisodeJobResult::not_found(index));
        };
        self.events.emit(PipelineEvent::EpisodeStarted { index });

        let mut job = JobState::new(episode.clone());
        match self.resolve_with_retry(&mut job, policy).await {
            Ok(stream) => Step::Resolved(job, stream),
            Err(ResolveStop::Exhausted) => Step::Finished(job.finish(JobStatus::ResolutionFailed, None)),
            Err(ResolveStop::Cancelled) => Step::Interrupted,
        }
    }

    /// Resolves until success or the resolve budget is spent. Attempts made
    /// for a re-resolution continue the same count.
    async fn resolve_with_retry(
        &mut self,
        job: &mut JobState,
        policy: &RetryPolicy,
    ) -> Result<ResolvedStream, ResolveStop> {
        let index = job.episode.index;
        loop {
            if self.control.is_cancelled() {
                return Err(ResolveStop::Cancelled);
            }
            if job.resolve_attempts >= policy.max_resolve_attempts {
                return Err(ResolveStop::Exhausted);
            }
            job.resolve_attempts += 1;
            let timeout = policy.resolve_timeout_for(job.timeouts_seen);
            tracing::debug!(
                episode = index,
                attempt = job.resolve_attempts,
                timeout_ms = timeout.as_millis() as u64,
                "resolve attempt"
            );

            let err = match self.resolver.resolve(&job.episode, timeout, &self.control).await {
                Ok(stream) => {
                    self.events.emit(PipelineEvent::Resolved {
                        index,
                        media_url: stream.media_url.clone(),
                    });
                    return Ok(stream);
                }
                Err(ResolveError::Cancelled) => return Err(ResolveStop::Cancelled),
                Err(e) => e,
            };

            let kind = classify_resolve(&err);
            if kind == ErrorKind::Timeout {
                job.timeouts_seen += 1;
            }
            job.last_error = Some(err.to_string());

            match policy.decide(Stage::Resolve, job.resolve_attempts, kind) {
                RetryDecision::NoRetry => {
                    tracing::debug!(episode = index, error = %err, "resolution failed");
                    return Err(ResolveStop::Exhausted);
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        episode = index,
                        attempt = job.resolve_attempts,
                        error = %err,
                        "resolve attempt failed, retrying in {:?}",
                        delay
                    );
                    self.events.emit(PipelineEvent::AttemptFailed {
                        index,
                        stage: Stage::Resolve,
                        attempt: job.resolve_attempts,
                        error: err.to_string(),
                        retry_in: delay,
                    });
                    if self.control.sleep(delay).await.is_err() {
                        return Err(ResolveStop::Cancelled);
                    }
                }
            }
        }
    }

    fn download_context(&self, episode: &EpisodeRef, policy: &RetryPolicy) -> DownloadContext {
        DownloadContext {
            executor: Arc::clone(&self.executor),
            target: self.layout.target(episode),
            control: self.control.clone(),
            policy: *policy,
            events: self.events.clone(),
        }
    }

    fn spawn_download(
        &self,
        position: usize,
        job: JobState,
        stream: ResolvedStream,
        policy: &RetryPolicy,
    ) -> PendingDownload {
        let ctx = self.download_context(&job.episode, policy);
        let can_re_resolve = job.resolve_attempts < policy.max_resolve_attempts;
        let mut attempts = job.download_attempts;
        let handle = tokio::spawn(async move {
            let outcome = download_with_retry(&ctx, &stream, &mut attempts, can_re_resolve).await;
            (attempts, outcome)
        });
        PendingDownload {
            position,
            job,
            handle,
        }
    }

    /// Waits for a download task and finalizes its episode, re-resolving
    /// expired links on this task. `Err(position)` when the run was
    /// cancelled before the episode finished.
    async fn settle(
        &mut self,
        pending: PendingDownload,
        policy: &RetryPolicy,
        report: &mut RunReport,
    ) -> Result<(), usize> {
        let PendingDownload {
            position,
            mut job,
            handle,
        } = pending;

        let mut outcome = match handle.await {
            Ok((attempts, outcome)) => {
                job.download_attempts = attempts;
                outcome
            }
            Err(e) => {
                job.download_attempts += 1;
                DownloadOutcome::Failed(DownloadError::permanent(format!(
                    "download task failed: {}",
                    e
                )))
            }
        };

        loop {
            match outcome {
                DownloadOutcome::Downloaded(path) => {
                    let result = job.finish(JobStatus::Succeeded, Some(path));
                    self.record(report, result);
                    return Ok(());
                }
                DownloadOutcome::Failed(e) => {
                    job.last_error = Some(e.to_string());
                    let result = job.finish(JobStatus::DownloadFailed, None);
                    self.record(report, result);
                    return Ok(());
                }
                DownloadOutcome::Cancelled => return Err(position),
                DownloadOutcome::Expired(e) => {
                    tracing::info!(episode = job.episode.index, error = %e, "link expired, re-resolving");
                    job.last_error = Some(e.to_string());
                    let stream = match self.resolve_with_retry(&mut job, policy).await {
                        Ok(fresh) => fresh,
                        Err(ResolveStop::Exhausted) => {
                            let result = job.finish(JobStatus::ResolutionFailed, None);
                            self.record(report, result);
                            return Ok(());
                        }
                        Err(ResolveStop::Cancelled) => return Err(position),
                    };
                    let ctx = self.download_context(&job.episode, policy);
                    let can_re_resolve = job.resolve_attempts < policy.max_resolve_attempts;
                    outcome =
                        download_with_retry(&ctx, &stream, &mut job.download_attempts, can_re_resolve)
                            .await;
                }
            }
        }
    }

    fn record(&self, report: &mut RunReport, result: EpisodeJobResult) {
        match result.status {
            JobStatus::Succeeded => tracing::info!(
                episode = result.episode.index,
                attempts = result.attempts,
                output = ?result.output,
                "episode downloaded"
            ),
            status => tracing::info!(
                episode = result.episode.index,
                attempts = result.attempts,
                %status,
                error = result.last_error.as_deref().unwrap_or(""),
                "episode failed"
            ),
        }
        self.events.emit(PipelineEvent::EpisodeFinished(result.clone()));
        report.results.push(result);
    }
}
