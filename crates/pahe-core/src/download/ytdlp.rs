//! yt-dlp child-process executor.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{DownloadError, DownloadExecutor, DownloadTarget};
use crate::control::RunControl;
use crate::resolver::ResolvedStream;
use crate::retry::classify_ytdlp_stderr;

/// Leftovers yt-dlp writes next to the final file.
const SIDE_EXTENSIONS: &[&str] = &["part", "ytdl", "temp", "srt", "vtt", "ass", "json"];

/// Runs `yt-dlp` once per episode: best video+audio merged to mp4, English
/// subtitles embedded, no resume.
#[derive(Debug, Clone)]
pub struct YtDlpExecutor {
    binary_path: PathBuf,
}

impl YtDlpExecutor {
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Looks `yt-dlp` up on PATH.
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Full argument list for one download.
    pub fn args(stream: &ResolvedStream, target: &DownloadTarget) -> Vec<String> {
        let template = target.dir.join(format!("{}.%(ext)s", target.stem));
        let mut args: Vec<String> = [
            "--newline",
            "--no-playlist",
            "--no-continue",
            "--format",
            "bestvideo+bestaudio/best",
            "--merge-output-format",
            "mp4",
            "--write-subs",
            "--sub-langs",
            "en,eng",
            "--sub-format",
            "srt/best",
            "--embed-subs",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut headers: Vec<(&String, &String)> = stream.headers.iter().collect();
        headers.sort();
        for (k, v) in headers {
            if k.eq_ignore_ascii_case("referer") {
                args.push("--referer".to_string());
                args.push(v.clone());
            } else {
                args.push("--add-header".to_string());
                args.push(format!("{}:{}", k.trim(), v.trim()));
            }
        }

        args.push("--output".to_string());
        args.push(template.to_string_lossy().into_owned());
        args.push(stream.media_url.clone());
        args
    }
}

#[async_trait]
impl DownloadExecutor for YtDlpExecutor {
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

        let child = Command::new(&self.binary_path)
            .args(Self::args(stream, target))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DownloadError::permanent(format!(
                    "failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;
        tracing::debug!(episode = stream.episode.index, stem = %target.stem, "yt-dlp started");

        let output = tokio::select! {
            _ = control.cancelled() => None,
            out = child.wait_with_output() => Some(out),
        };
        let Some(output) = output else {
            // Dropping the wait future killed the child.
            remove_leftovers(&target.dir, &target.stem).await;
            return Err(DownloadError::cancelled());
        };
        let output = output
            .map_err(|e| DownloadError::transient(format!("waiting for yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let kind = classify_ytdlp_stderr(&stderr);
            let message = last_error_line(&stderr)
                .unwrap_or_else(|| format!("yt-dlp exited with {}", output.status));
            tracing::debug!(episode = stream.episode.index, %kind, %message, "yt-dlp failed");
            remove_leftovers(&target.dir, &target.stem).await;
            return Err(DownloadError::new(kind, message));
        }

        find_output(&target.dir, &target.stem).await.ok_or_else(|| {
            DownloadError::permanent(format!(
                "yt-dlp reported success but no {}.* file in {}",
                target.stem,
                target.dir.display()
            ))
        })
    }
}

/// Most informative stderr line: the last `ERROR:` line, else the last non-empty one.
fn last_error_line(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
}

/// `<stem>.<ext>` with a media extension; skips fragments like `<stem>.f137.mp4`.
fn is_final_output(name: &str, stem: &str) -> bool {
    let Some(rest) = name.strip_prefix(stem).and_then(|r| r.strip_prefix('.')) else {
        return false;
    };
    !rest.is_empty() && !rest.contains('.') && !SIDE_EXTENSIONS.contains(&rest)
}

async fn find_output(dir: &Path, stem: &str) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut found: Vec<PathBuf> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Some(name) = entry.file_name().to_str() {
            if is_final_output(name, stem) {
                found.push(entry.path());
            }
        }
    }
    found.sort();
    let mp4 = found
        .iter()
        .position(|p| p.extension().is_some_and(|e| e == "mp4"));
    match mp4 {
        Some(i) => Some(found.swap_remove(i)),
        None => found.into_iter().next(),
    }
}

/// Removes partial and fragment files of `stem`; finished files are left alone.
async fn remove_leftovers(dir: &Path, stem: &str) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Some(rest) = name.strip_prefix(stem).and_then(|r| r.strip_prefix('.')) else {
            continue;
        };
        let partial = rest.ends_with(".part")
            || rest.ends_with(".ytdl")
            || rest == "part"
            || rest == "ytdl"
            || rest.contains(".part-Frag");
        if partial {
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                tracing::warn!(path = %entry.path().display(), error = %e, "failed to remove partial file");
            }
        }
    }
}
