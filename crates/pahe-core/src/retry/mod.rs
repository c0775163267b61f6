//! Retry and backoff policy.
//!
//! This module encapsulates error classification (navigation timeouts, lost
//! sessions, markup changes, expired links, transient network failures) and
//! exponential backoff decisions so that the orchestrator applies one
//! consistent, independently testable policy to both pipeline stages.

mod classify;
mod policy;

pub use classify::{
    classify_curl_error, classify_download, classify_http_status, classify_resolve,
    classify_ytdlp_stderr,
};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy, Stage};
