//! Where the media URL lives inside the player frame, and what it says about expiry.

use regex::Regex;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Direct media URL inside inline scripts (`source='https://…/uwu.m3u8'`).
fn default_source_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"https?://[^\s'"<>\\]+\.(?:m3u8|mp4)(?:\?[^\s'"<>\\]*)?"#)
            .expect("static media url pattern")
    })
}

/// Reads `attribute` of the first element matching `selector`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeProbe {
    pub selector: String,
    pub attribute: String,
}

impl AttributeProbe {
    pub fn new(selector: &str, attribute: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

/// The page markup the resolver relies on. All of it is fragile by nature, so
/// it is data rather than code.
#[derive(Debug, Clone)]
pub struct SelectorContract {
    /// Player frame on the watch page.
    pub frame_selector: String,
    /// Tried in order inside the frame.
    pub probes: Vec<AttributeProbe>,
    /// Last resort: scanned over the frame's page source.
    pub source_pattern: Regex,
}

impl Default for SelectorContract {
    fn default() -> Self {
        Self {
            frame_selector: "iframe[src*='kwik']".to_string(),
            probes: vec![
                AttributeProbe::new("video source[src]", "src"),
                AttributeProbe::new("video[src]", "src"),
                AttributeProbe::new("a#download", "href"),
            ],
            source_pattern: default_source_pattern().clone(),
        }
    }
}

impl SelectorContract {
    pub fn with_frame_selector(mut self, selector: impl Into<String>) -> Self {
        self.frame_selector = selector.into();
        self
    }

    /// First media URL in `html`, if any.
    pub fn scan_source(&self, html: &str) -> Option<String> {
        self.source_pattern
            .find(html)
            .map(|m| m.as_str().to_string())
    }
}

/// Accepts a probed attribute value as a media URL candidate.
///
/// Empty values and `blob:` URLs (MediaSource buffers, not fetchable) are
/// rejected. Relative values are joined onto `base`.
pub(super) fn normalize_candidate(value: &str, base: Option<&str>) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with("blob:") || value.starts_with("javascript:") {
        return None;
    }
    if let Ok(u) = url::Url::parse(value) {
        return matches!(u.scheme(), "http" | "https").then(|| u.to_string());
    }
    let base = url::Url::parse(base?).ok()?;
    let joined = base.join(value).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

/// Expiry encoded in the media URL's query (`expires`, `exp` or `e`, unix seconds).
pub fn expiry_from_url(media_url: &str) -> Option<SystemTime> {
    let url = url::Url::parse(media_url).ok()?;
    url.query_pairs()
        .find(|(k, _)| matches!(k.as_ref(), "expires" | "exp" | "e"))
        .and_then(|(_, v)| v.parse::<u64>().ok())
        .and_then(|secs| UNIX_EPOCH.checked_add(Duration::from_secs(secs)))
}
