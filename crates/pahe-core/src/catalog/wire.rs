//! JSON shapes of the catalog API and their conversion to domain types.

use serde::Deserialize;

use super::{watch_page_id, AnimeSummary, EpisodeRef};

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
    #[serde(default)]
    pub data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchItem {
    pub id: u64,
    pub title: String,
    pub session: String,
}

impl From<SearchItem> for AnimeSummary {
    fn from(item: SearchItem) -> Self {
        AnimeSummary {
            id: item.id,
            title: item.title,
            session: item.session,
        }
    }
}

/// One page of the release listing (`m=release`).
#[derive(Debug, Deserialize)]
pub(super) struct ReleasePage {
    #[serde(default)]
    pub data: Vec<ReleaseItem>,
    #[serde(default)]
    pub last_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ReleaseItem {
    /// Number or numeric string; fractional specials (e.g. 12.5) exist.
    pub episode: serde_json::Value,
    pub session: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Integral episode number, or `None` for specials and garbage.
pub(super) fn episode_number(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return u32::try_from(u).ok();
            }
            let f = n.as_f64()?;
            if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 {
                Some(f as u32)
            } else {
                None
            }
        }
        serde_json::Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Converts release items into episode refs, dropping non-integral and zero
/// episode numbers.
pub(super) fn episode_refs(anime_session: &str, items: Vec<ReleaseItem>) -> Vec<EpisodeRef> {
    items
        .into_iter()
        .filter_map(|item| {
            let Some(index) = episode_number(&item.episode).filter(|&n| n >= 1) else {
                tracing::debug!(episode = %item.episode, "skipping non-integral episode");
                return None;
            };
            let title = item
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("Episode {}", index));
            Some(EpisodeRef {
                index,
                watch_page_id: watch_page_id(anime_session, &item.session),
                title,
            })
        })
        .collect()
}
