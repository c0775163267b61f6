//! Fake W3C WebDriver endpoint with a scripted set of watch pages.
//!
//! Pages are keyed by the path of the navigated URL (`/play/<id>`). The
//! embedded player frame is virtual: switching into it changes what element
//! lookups and the page source return.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::http_server::{self, Request, Response};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Clone)]
pub enum Media {
    /// `<video><source src=..></video>` inside the frame.
    SourceTag(String),
    /// Inline script carrying the URL; only the page-source scan finds it.
    Script(String),
    Nothing,
}

#[derive(Debug, Clone)]
pub enum FakePage {
    Player { frame_src: String, media: Media },
    NoFrame,
    /// Page load exceeds the driver's page-load timeout.
    SlowLoad,
}

#[derive(Debug, Default)]
pub struct DriverStats {
    pub created: AtomicUsize,
    pub deleted: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
    pub capabilities: Mutex<Vec<Value>>,
}

impl DriverStats {
    pub fn open_sessions(&self) -> usize {
        self.created.load(Ordering::SeqCst) - self.deleted.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct SessionState {
    page: Option<String>,
    in_frame: bool,
}

pub struct FakeDriver {
    pub endpoint: String,
    pub stats: Arc<DriverStats>,
}

fn ok(value: Value) -> Response {
    Response::json(200, &json!({ "value": value }))
}

fn error(status: u16, error: &str, message: &str) -> Response {
    Response::json(
        status,
        &json!({ "value": { "error": error, "message": message, "stacktrace": "" } }),
    )
}

fn element(id: &str) -> Response {
    ok(json!({ ELEMENT_KEY: id }))
}

pub fn start(pages: HashMap<String, FakePage>) -> FakeDriver {
    let stats = Arc::new(DriverStats::default());
    let st = Arc::clone(&stats);
    let sessions: Mutex<HashMap<String, SessionState>> = Mutex::new(HashMap::new());

    let endpoint = http_server::start(move |req: &Request| {
        let segments: Vec<&str> = req.path().trim_matches('/').split('/').collect();
        match (req.method.as_str(), segments.as_slice()) {
            ("POST", ["session"]) => {
                let n = st.created.fetch_add(1, Ordering::SeqCst) + 1;
                let id = format!("session-{}", n);
                st.capabilities.lock().unwrap().push(req.json());
                sessions
                    .lock()
                    .unwrap()
                    .insert(id.clone(), SessionState::default());
                ok(json!({ "sessionId": id, "capabilities": { "browserName": "chrome" } }))
            }
            ("DELETE", ["session", sid]) => {
                if sessions.lock().unwrap().remove(*sid).is_some() {
                    st.deleted.fetch_add(1, Ordering::SeqCst);
                    ok(Value::Null)
                } else {
                    error(404, "invalid session id", "unknown session")
                }
            }
            (method, ["session", sid, rest @ ..]) => {
                let mut sessions = sessions.lock().unwrap();
                let Some(session) = sessions.get_mut(*sid) else {
                    return error(404, "invalid session id", "unknown session");
                };
                let page = session.page.as_ref().and_then(|p| pages.get(p));
                match (method, rest) {
                    ("POST", ["timeouts"]) => ok(Value::Null),
                    ("POST", ["url"]) => {
                        let target = req.json()["url"].as_str().unwrap_or_default().to_string();
                        let path = url::Url::parse(&target)
                            .map(|u| u.path().to_string())
                            .unwrap_or_default();
                        st.navigations.lock().unwrap().push(target);
                        session.page = Some(path.clone());
                        session.in_frame = false;
                        match pages.get(&path) {
                            Some(FakePage::SlowLoad) => error(500, "timeout", "page load timed out"),
                            _ => ok(Value::Null),
                        }
                    }
                    ("POST", ["execute", "sync"]) => ok(json!("complete")),
                    ("POST", ["element"]) => {
                        let css = req.json()["value"].as_str().unwrap_or_default().to_string();
                        match (page, session.in_frame) {
                            (Some(FakePage::Player { .. }), false) if css.starts_with("iframe") => {
                                element("frame-1")
                            }
                            (Some(FakePage::Player { media: Media::SourceTag(_), .. }), true)
                                if css == "video source[src]" =>
                            {
                                element("source-1")
                            }
                            _ => error(404, "no such element", &format!("no element for {}", css)),
                        }
                    }
                    ("GET", ["element", el, "attribute", name]) => match (page, *el, *name) {
                        (Some(FakePage::Player { frame_src, .. }), "frame-1", "src") => {
                            ok(json!(frame_src))
                        }
                        (Some(FakePage::Player { media: Media::SourceTag(url), .. }), "source-1", "src") => {
                            ok(json!(url))
                        }
                        _ => ok(Value::Null),
                    },
                    ("POST", ["frame"]) => {
                        session.in_frame = !req.json()["id"].is_null();
                        ok(Value::Null)
                    }
                    ("GET", ["source"]) => match (page, session.in_frame) {
                        (Some(FakePage::Player { media: Media::Script(url), .. }), true) => ok(json!(
                            format!("<html><script>var source='{}';</script></html>", url)
                        )),
                        _ => ok(json!("<html><body></body></html>")),
                    },
                    _ => error(404, "unknown command", req.path()),
                }
            }
            _ => error(404, "unknown command", req.path()),
        }
    });

    FakeDriver { endpoint, stats }
}
