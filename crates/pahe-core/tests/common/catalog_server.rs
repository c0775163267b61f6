//! Fake catalog JSON API (`/api?m=search` and paginated `/api?m=release`).

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use super::http_server::{self, Request, Response};

#[derive(Debug, Clone)]
pub struct FakeAnime {
    pub id: u64,
    pub title: String,
    pub session: String,
    /// Raw `episode` values as the API reports them (numbers, strings, specials).
    pub episodes: Vec<Value>,
}

impl FakeAnime {
    pub fn new(id: u64, title: &str, episode_count: u32) -> Self {
        Self {
            id,
            title: title.to_string(),
            session: format!("anime-{}", id),
            episodes: (1..=episode_count).map(|n| json!(n)).collect(),
        }
    }
}

pub struct CatalogServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<Request>>>,
}

/// Serves `anime` with `page_size` episodes per release page. Any request for
/// an unknown anime id answers HTTP 500.
pub fn start(anime: Vec<FakeAnime>, page_size: usize) -> CatalogServer {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    let base_url = http_server::start(move |req| {
        log.lock().unwrap().push(req.clone());
        if req.path() != "/api" {
            return Response::text(404, "not found");
        }
        let q = req.query();
        match q.get("m").map(String::as_str) {
            Some("search") => {
                let needle = q.get("q").cloned().unwrap_or_default().to_lowercase();
                let data: Vec<Value> = anime
                    .iter()
                    .filter(|a| a.title.to_lowercase().contains(&needle))
                    .map(|a| json!({"id": a.id, "title": a.title, "session": a.session, "type": "TV"}))
                    .collect();
                Response::json(200, &json!({"total": data.len(), "data": data}))
            }
            Some("release") => {
                let id: u64 = q.get("id").and_then(|s| s.parse().ok()).unwrap_or(0);
                let Some(a) = anime.iter().find(|a| a.id == id) else {
                    return Response::text(500, "internal error");
                };
                let page: usize = q.get("page").and_then(|s| s.parse().ok()).unwrap_or(1);
                let last_page = a.episodes.len().div_ceil(page_size).max(1);
                let data: Vec<Value> = a
                    .episodes
                    .iter()
                    .skip((page - 1) * page_size)
                    .take(page_size)
                    .enumerate()
                    .map(|(i, ep)| {
                        json!({
                            "episode": ep,
                            "session": format!("ep-{}-{}", page, i),
                            "snapshot": "https://i.example/snap.jpg"
                        })
                    })
                    .collect();
                Response::json(
                    200,
                    &json!({"total": a.episodes.len(), "current_page": page, "last_page": last_page, "data": data}),
                )
            }
            _ => Response::text(400, "bad request"),
        }
    });
    CatalogServer { base_url, requests }
}
