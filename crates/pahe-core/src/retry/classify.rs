//! Classify pipeline failures into retry policy error kinds.

use crate::download::{DownloadError, DownloadFailureKind};
use crate::resolver::ResolveError;
use crate::retry::policy::ErrorKind;

/// Classify a resolve failure for retry decisions.
pub fn classify_resolve(e: &ResolveError) -> ErrorKind {
    match e {
        ResolveError::NavigationTimeout { .. } => ErrorKind::Timeout,
        ResolveError::SessionError(_) => ErrorKind::Session,
        ResolveError::FrameNotFound { .. } | ResolveError::ExtractionFailed(_) => ErrorKind::Markup,
        ResolveError::Cancelled => ErrorKind::Cancelled,
    }
}

/// Classify a download failure for retry decisions.
pub fn classify_download(e: &DownloadError) -> ErrorKind {
    match e.kind {
        DownloadFailureKind::Transient => ErrorKind::Transient,
        DownloadFailureKind::Expired => ErrorKind::Expired,
        DownloadFailureKind::Permanent => ErrorKind::Permanent,
        DownloadFailureKind::Cancelled => ErrorKind::Cancelled,
    }
}

/// Classify an HTTP status code of a media GET.
pub fn classify_http_status(code: u32) -> DownloadFailureKind {
    match code {
        403 | 410 => DownloadFailureKind::Expired,
        408 | 429 | 500..=599 => DownloadFailureKind::Transient,
        _ => DownloadFailureKind::Permanent,
    }
}

/// Classify a curl error of a media GET.
pub fn classify_curl_error(e: &curl::Error) -> DownloadFailureKind {
    if e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return DownloadFailureKind::Transient;
    }
    DownloadFailureKind::Permanent
}

/// Classify yt-dlp stderr of a failed run.
pub fn classify_ytdlp_stderr(stderr: &str) -> DownloadFailureKind {
    let s = stderr.to_ascii_lowercase();
    const EXPIRED: &[&str] = &["http error 403", "http error 410", "403: forbidden", "410: gone"];
    const TRANSIENT: &[&str] = &[
        "timed out",
        "timeout",
        "connection reset",
        "connection refused",
        "connection aborted",
        "temporary failure in name resolution",
        "remote end closed connection",
        "http error 429",
        "http error 5",
        "incomplete read",
        "unable to download video data",
        "did not get any data blocks",
    ];
    if EXPIRED.iter().any(|p| s.contains(p)) {
        DownloadFailureKind::Expired
    } else if TRANSIENT.iter().any(|p| s.contains(p)) {
        DownloadFailureKind::Transient
    } else {
        DownloadFailureKind::Permanent
    }
}
