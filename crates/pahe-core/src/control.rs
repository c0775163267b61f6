//! Run control: user-initiated cancellation of a pipeline run.
//!
//! One `RunControl` is shared by the CLI (which cancels it on Ctrl-C), the
//! orchestrator (which stops before the next episode), the resolver (which
//! unwinds its browser session) and the executors (which kill or abort the
//! transfer in flight).

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Error returned when work is stopped because the run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunAborted;

impl std::fmt::Display for RunAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run cancelled by user")
    }
}

impl std::error::Error for RunAborted {}

/// Cloneable cancellation handle; every clone observes the same state.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    token: CancellationToken,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("cancellation requested");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`RunControl::cancel`] has been called.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Sleeps for `d` unless cancelled first. Returns `Err(RunAborted)` on cancellation.
    pub async fn sleep(&self, d: std::time::Duration) -> Result<(), RunAborted> {
        tokio::select! {
            _ = self.token.cancelled() => Err(RunAborted),
            _ = tokio::time::sleep(d) => Ok(()),
        }
    }
}
