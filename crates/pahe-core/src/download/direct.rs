//! Single-stream HTTP GET executor.
//!
//! Writes the response body sequentially to `<stem>.part` and renames it to
//! `<stem>.<ext>` once the transfer completed with a 2xx status.

use async_trait::async_trait;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use super::{DownloadError, DownloadExecutor, DownloadTarget};
use crate::control::RunControl;
use crate::resolver::ResolvedStream;
use crate::retry::{classify_curl_error, classify_http_status};

/// Plain GET with curl; suited to progressive mp4 links.
#[derive(Debug, Clone)]
pub struct DirectExecutor {
    connect_timeout: Duration,
    /// Abort when the rate stays below 1 KiB/s for this long.
    low_speed_time: Duration,
}

impl Default for DirectExecutor {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_time: Duration::from_secs(60),
        }
    }
}

impl DirectExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn fetch_to_file(
        &self,
        stream: &ResolvedStream,
        target: &DownloadTarget,
        control: &RunControl,
    ) -> Result<PathBuf, DownloadError> {
        let part = target.partial_path();
        let file = File::create(&part)
            .map_err(|e| DownloadError::permanent(format!("create {}: {}", part.display(), e)))?;

        let content_type = match self.transfer(stream, file, control) {
            Ok(ct) => ct,
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&part) {
                    tracing::warn!(path = %part.display(), error = %rm, "failed to remove partial file");
                }
                return Err(e);
            }
        };

        let ext = extension_for(&stream.media_url, content_type.as_deref());
        let dest = target.path_with_extension(&ext);
        std::fs::rename(&part, &dest).map_err(|e| {
            DownloadError::permanent(format!("rename to {}: {}", dest.display(), e))
        })?;
        Ok(dest)
    }

    /// Runs the GET; returns the response `Content-Type`.
    fn transfer(
        &self,
        stream: &ResolvedStream,
        mut file: File,
        control: &RunControl,
    ) -> Result<Option<String>, DownloadError> {
        let setup = |e: curl::Error| DownloadError::permanent(format!("curl: {}", e));

        let mut easy = curl::easy::Easy::new();
        easy.url(&stream.media_url)
            .map_err(|e| DownloadError::permanent(format!("invalid URL: {}", e)))?;
        easy.follow_location(true).map_err(setup)?;
        easy.max_redirections(10).map_err(setup)?;
        easy.connect_timeout(self.connect_timeout).map_err(setup)?;
        easy.low_speed_limit(1024).map_err(setup)?;
        easy.low_speed_time(self.low_speed_time).map_err(setup)?;
        easy.progress(true).map_err(setup)?;

        let mut list = curl::easy::List::new();
        for (k, v) in &stream.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))
                .map_err(setup)?;
        }
        if !stream.headers.is_empty() {
            easy.http_headers(list).map_err(setup)?;
        }

        let mut write_error: Option<std::io::Error> = None;
        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    if control.is_cancelled() {
                        return Ok(0);
                    }
                    match file.write_all(data) {
                        Ok(()) => Ok(data.len()),
                        Err(e) => {
                            write_error = Some(e);
                            Ok(0) // abort transfer
                        }
                    }
                })
                .map_err(setup)?;
            transfer
                .progress_function(|_, _, _, _| !control.is_cancelled())
                .map_err(setup)?;
            transfer.perform()
        };

        if control.is_cancelled() {
            return Err(DownloadError::cancelled());
        }
        if let Some(e) = write_error {
            return Err(DownloadError::permanent(format!("write failed: {}", e)));
        }
        if let Err(e) = performed {
            return Err(DownloadError::new(
                classify_curl_error(&e),
                format!("GET failed: {}", e),
            ));
        }

        let code = easy.response_code().map_err(setup)?;
        if !(200..300).contains(&code) {
            return Err(DownloadError::new(
                classify_http_status(code),
                format!("GET {} returned HTTP {}", stream.media_url, code),
            ));
        }
        file.sync_all()
            .map_err(|e| DownloadError::permanent(format!("sync failed: {}", e)))?;

        Ok(easy.content_type().ok().flatten().map(str::to_string))
    }
}

#[async_trait]
impl DownloadExecutor for DirectExecutor {
    async fn download(
        &self,
        stream: &ResolvedStream,
        target: &DownloadTarget,
        control: &RunControl,
    ) -> Result<PathBuf, DownloadError> {
        if control.is_cancelled() {
            return Err(DownloadError::cancelled());
        }
        tokio::fs::create_dir_all(&target.dir).await.map_err(|e| {
            DownloadError::permanent(format!("create {}: {}", target.dir.display(), e))
        })?;

        let this = self.clone();
        let stream = stream.clone();
        let target = target.clone();
        let control = control.clone();
        tracing::debug!(episode = stream.episode.index, url = %stream.media_url, "direct download started");
        tokio::task::spawn_blocking(move || this.fetch_to_file(&stream, &target, &control))
            .await
            .map_err(|e| DownloadError::permanent(format!("download worker failed: {}", e)))?
    }
}

/// Extension from the URL path, else from `Content-Type`, else `mp4`.
fn extension_for(media_url: &str, content_type: Option<&str>) -> String {
    let from_path = url::Url::parse(media_url).ok().and_then(|u| {
        let last = u.path_segments()?.last()?.to_string();
        let (_, ext) = last.rsplit_once('.')?;
        let ok = (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric());
        ok.then(|| ext.to_ascii_lowercase())
    });
    if let Some(ext) = from_path {
        return ext;
    }
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase());
    match mime.as_deref() {
        Some("video/webm") => "webm",
        Some("video/x-matroska") => "mkv",
        Some("video/mp2t") => "ts",
        Some("video/quicktime") => "mov",
        Some("application/vnd.apple.mpegurl") | Some("application/x-mpegurl") => "m3u8",
        _ => "mp4",
    }
    .to_string()
}
