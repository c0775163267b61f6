//! Static media host with scripted failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::http_server::{self, Request, Response};

#[derive(Debug, Clone)]
pub struct MediaRoute {
    pub content_type: String,
    pub body: Vec<u8>,
    /// Statuses returned by the first requests, in order, before the body is served.
    pub failures: Vec<u16>,
}

impl MediaRoute {
    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            content_type: content_type.to_string(),
            body,
            failures: Vec::new(),
        }
    }

    pub fn failing(mut self, statuses: &[u16]) -> Self {
        self.failures = statuses.to_vec();
        self
    }
}

pub struct MediaServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<Request>>>,
}

impl MediaServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path() == path)
            .count()
    }
}

pub fn start(routes: HashMap<String, MediaRoute>) -> MediaServer {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    let routes = Arc::new(Mutex::new(routes));
    let base_url = http_server::start(move |req| {
        log.lock().unwrap().push(req.clone());
        let mut routes = routes.lock().unwrap();
        let Some(route) = routes.get_mut(req.path()) else {
            return Response::text(404, "not found");
        };
        if !route.failures.is_empty() {
            let status = route.failures.remove(0);
            return Response::text(status, "scripted failure");
        }
        Response::new(200, &route.content_type, route.body.clone())
    });
    MediaServer { base_url, requests }
}
