//! Episode catalog: search results and per-anime episode listings.
//!
//! The pipeline only sees [`CatalogClient`]; [`PaheApi`] is the HTTP
//! implementation against the AnimePahe JSON API.

mod api;
mod query;
mod wire;

pub use api::PaheApi;
pub use query::{filter_by_language, parse_search_query, LanguagePreference};

use async_trait::async_trait;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeSummary {
    /// Numeric catalog id (used by the release listing).
    pub id: u64,
    pub title: String,
    /// Opaque session token (first half of every watch page id).
    pub session: String,
}

impl AnimeSummary {
    /// True when the title marks a dubbed release.
    pub fn is_dub(&self) -> bool {
        self.title.to_lowercase().contains("dub")
    }
}

/// One episode as reported by the catalog. Read-only downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRef {
    /// 1-based episode number as the catalog numbers it.
    pub index: u32,
    /// Opaque token identifying the episode's watch page.
    pub watch_page_id: String,
    pub title: String,
}

/// Catalog failure. Fatal to a whole run: without a listing there is nothing to iterate.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Search and episode listing. Implementations are idempotent; the pipeline
/// never retries them.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<AnimeSummary>, CatalogError>;

    /// Every episode of `anime`, ordered by index.
    async fn list_episodes(&self, anime: &AnimeSummary) -> Result<Vec<EpisodeRef>, CatalogError>;
}

/// Watch page id for an episode: `<anime-session>/<episode-session>`.
pub fn watch_page_id(anime_session: &str, episode_session: &str) -> String {
    format!("{}/{}", anime_session, episode_session)
}

/// Lowest and highest episode index in a listing.
pub fn index_bounds(episodes: &[EpisodeRef]) -> Option<(u32, u32)> {
    let min = episodes.iter().map(|e| e.index).min()?;
    let max = episodes.iter().map(|e| e.index).max()?;
    Some((min, max))
}
