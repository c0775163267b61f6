//! HTTP catalog client for the AnimePahe JSON API.

use async_trait::async_trait;
use std::time::Duration;

use super::wire::{episode_refs, ReleasePage, SearchResponse};
use super::{AnimeSummary, CatalogClient, CatalogError, EpisodeRef};
use crate::config::CatalogConfig;
use crate::http::{self, Request};

/// Episodes requested per release page.
const PAGE_SIZE: u32 = 100;

/// Catalog client backed by `<base>/api`.
#[derive(Debug, Clone)]
pub struct PaheApi {
    base_url: String,
    user_agent: String,
    timeout: Duration,
}

impl PaheApi {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            user_agent: user_agent.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &CatalogConfig) -> Self {
        Self::new(
            cfg.base_url.clone(),
            cfg.user_agent.clone(),
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, params: &[(&str, String)]) -> Result<String, CatalogError> {
        let url = url::Url::parse_with_params(&format!("{}/api", self.base_url), params)
            .map_err(|e| CatalogError::Unavailable(format!("bad catalog url: {}", e)))?;
        Ok(url.into())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, CatalogError> {
        tracing::debug!(%url, "catalog request");
        let req = Request::get(url.clone(), self.timeout)
            .header("User-Agent", &self.user_agent)
            .header("Referer", &self.base_url)
            .header("Accept", "application/json");
        let resp = http::request_async(req)
            .await
            .map_err(|e| CatalogError::Unavailable(format!("GET {}: {}", url, e)))?;
        if !resp.is_success() {
            return Err(CatalogError::Unavailable(format!(
                "GET {} returned HTTP {}",
                url, resp.status
            )));
        }
        resp.json()
            .map_err(|e| CatalogError::Unavailable(format!("GET {}: invalid JSON: {}", url, e)))
    }
}

#[async_trait]
impl CatalogClient for PaheApi {
    async fn search(&self, query: &str) -> Result<Vec<AnimeSummary>, CatalogError> {
        let url = self.api_url(&[("m", "search".to_string()), ("q", query.to_string())])?;
        let resp: SearchResponse = self.get_json(url).await?;
        Ok(resp.data.into_iter().map(Into::into).collect())
    }

    async fn list_episodes(&self, anime: &AnimeSummary) -> Result<Vec<EpisodeRef>, CatalogError> {
        let mut episodes = Vec::new();
        let mut page = 1u32;
        loop {
            let url = self.api_url(&[
                ("m", "release".to_string()),
                ("id", anime.id.to_string()),
                ("sort", "asc".to_string()),
                ("page", page.to_string()),
                ("l", PAGE_SIZE.to_string()),
            ])?;
            let resp: ReleasePage = self.get_json(url).await?;
            let was_empty = resp.data.is_empty();
            episodes.extend(episode_refs(&anime.session, resp.data));

            let last_page = resp.last_page.unwrap_or(page);
            if page >= last_page || was_empty {
                break;
            }
            page += 1;
        }

        episodes.sort_by_key(|e| e.index);
        episodes.dedup_by_key(|e| e.index);
        tracing::info!(anime = %anime.title, count = episodes.len(), pages = page, "listed episodes");
        Ok(episodes)
    }
}
