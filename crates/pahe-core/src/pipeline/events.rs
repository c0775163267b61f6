//! Progress events for front ends.

use std::time::Duration;
use tokio::sync::mpsc;

use super::report::EpisodeJobResult;
use crate::retry::Stage;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    EpisodeStarted {
        index: u32,
    },
    Resolved {
        index: u32,
        media_url: String,
    },
    DownloadStarted {
        index: u32,
        attempt: u32,
    },
    /// A failed attempt that will be retried after `retry_in`.
    AttemptFailed {
        index: u32,
        stage: Stage,
        attempt: u32,
        error: String,
        retry_in: Duration,
    },
    EpisodeFinished(EpisodeJobResult),
}

/// Optional event channel; sends never block and a dropped receiver is ignored.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink(Option<mpsc::UnboundedSender<PipelineEvent>>);

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self(Some(tx))
    }

    pub(crate) fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.0 {
            tx.send(event).ok();
        }
    }
}
