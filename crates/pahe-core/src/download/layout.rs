//! Output layout: `<root>/<sanitized title>/Episode_<NNN>.<ext>`.

use std::path::{Path, PathBuf};

use super::DownloadTarget;
use crate::catalog::EpisodeRef;

/// Directory name used when a title sanitizes to nothing.
pub const DEFAULT_TITLE: &str = "Anime";

/// Turns a catalog title into a single safe path component.
///
/// - Replaces `\ / * ? : " < > |`, NUL and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing spaces, dots and underscores
/// - Limits length to 255 bytes (Linux NAME_MAX)
/// - Falls back to [`DEFAULT_TITLE`] when nothing is left
pub fn sanitize_title(title: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(title.len());
    let mut prev_underscore = false;

    for c in title.chars() {
        let replacement = if matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|')
            || c.is_control()
        {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '_');
    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    let capped = trimmed[..take].trim_end();

    if capped.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        capped.to_string()
    }
}

/// Maps episodes of one series to download targets under a root directory.
#[derive(Debug, Clone)]
pub struct DownloadLayout {
    series_dir: PathBuf,
}

impl DownloadLayout {
    pub fn new(root: &Path, title: &str) -> Self {
        Self {
            series_dir: root.join(sanitize_title(title)),
        }
    }

    pub fn series_dir(&self) -> &Path {
        &self.series_dir
    }

    pub fn episode_stem(index: u32) -> String {
        format!("Episode_{:03}", index)
    }

    pub fn target(&self, episode: &EpisodeRef) -> DownloadTarget {
        DownloadTarget {
            dir: self.series_dir.clone(),
            stem: Self::episode_stem(episode.index),
        }
    }
}
