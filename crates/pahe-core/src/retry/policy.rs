use std::time::Duration;

use crate::config::PaheConfig;

/// Pipeline stage an attempt belongs to; each has its own attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Download,
}

/// High-level classification of a failed attempt for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Page did not load in time; retried with a longer timeout.
    Timeout,
    /// Browser session failed or could not be created.
    Session,
    /// Expected markup missing (frame or media element). Usually a stable
    /// site change, so not retried.
    Markup,
    /// Network hiccup, throttling or server error during download.
    Transient,
    /// The resolved link stopped working; retry needs a fresh resolution.
    Expired,
    /// Anything retrying will not fix.
    Permanent,
    Cancelled,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Per-stage attempt budgets, exponential backoff with caps, and resolve
/// timeout escalation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum resolve attempts per episode (including the first).
    pub max_resolve_attempts: u32,
    /// Maximum download attempts per episode (including the first).
    pub max_download_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
    /// Timeout for the first resolve attempt.
    pub resolve_timeout: Duration,
    /// Multiplier applied to the resolve timeout after each navigation timeout.
    pub timeout_growth: f64,
    /// Upper bound on the grown resolve timeout.
    pub max_resolve_timeout: Duration,
    /// Whether an expired link is retried through a fresh resolution.
    pub re_resolve_on_expiry: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PaheConfig::default())
    }
}

impl RetryPolicy {
    /// Builds the policy from `[retry]`, taking the initial resolve timeout
    /// from `[browser]`.
    pub fn from_config(cfg: &PaheConfig) -> Self {
        let r = &cfg.retry;
        Self {
            max_resolve_attempts: r.max_resolve_attempts.max(1),
            max_download_attempts: r.max_download_attempts.max(1),
            base_delay: Duration::try_from_secs_f64(r.base_delay_secs)
                .unwrap_or(Duration::from_secs(1)),
            max_delay: Duration::from_secs(r.max_delay_secs),
            resolve_timeout: Duration::from_secs(cfg.browser.resolve_timeout_secs.max(1)),
            timeout_growth: if r.timeout_growth.is_finite() && r.timeout_growth >= 1.0 {
                r.timeout_growth
            } else {
                1.0
            },
            max_resolve_timeout: Duration::from_secs(r.max_resolve_timeout_secs),
            re_resolve_on_expiry: r.re_resolve_on_expiry,
        }
    }

    pub fn max_attempts(&self, stage: Stage) -> u32 {
        match stage {
            Stage::Resolve => self.max_resolve_attempts,
            Stage::Download => self.max_download_attempts,
        }
    }

    /// Whether `kind` is worth another attempt in `stage`, ignoring budgets.
    pub fn is_retryable(&self, stage: Stage, kind: ErrorKind) -> bool {
        match (stage, kind) {
            (Stage::Resolve, ErrorKind::Timeout | ErrorKind::Session) => true,
            (Stage::Download, ErrorKind::Transient) => true,
            (Stage::Download, ErrorKind::Expired) => self.re_resolve_on_expiry,
            _ => false,
        }
    }

    /// Compute the next backoff delay for a given attempt and error kind.
    ///
    /// `attempt` is 1-based (1 = first attempt). Returns `RetryDecision::NoRetry`
    /// when we should stop retrying.
    pub fn decide(&self, stage: Stage, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts(stage) || !self.is_retryable(stage, kind) {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff(attempt))
    }

    /// Exponential backoff: base * 2^(attempt-1), capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }

    /// Resolve timeout after `timeouts_seen` navigation timeouts for this episode.
    pub fn resolve_timeout_for(&self, timeouts_seen: u32) -> Duration {
        let factor = self.timeout_growth.powi(timeouts_seen.min(32) as i32);
        let grown = Duration::try_from_secs_f64(self.resolve_timeout.as_secs_f64() * factor)
            .unwrap_or(self.max_resolve_timeout);
        grown.min(self.max_resolve_timeout.max(self.resolve_timeout))
    }
}
