//! W3C WebDriver client (chromedriver and compatible endpoints).
//!
//! Every command is one blocking curl request run on the blocking pool. A
//! session that is dropped without `close` still issues a best-effort
//! `DELETE /session/{id}` from a background thread so the browser process
//! does not outlive its owner.

mod wire;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

use super::{BrowserError, BrowserLauncher, BrowserSession, ElementHandle};
use crate::config::BrowserConfig;
use crate::http::{self, HttpError, Method, Request};

/// Timeout for ordinary commands (find element, attribute, frame switch).
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// Extra HTTP time on top of the page-load timeout for `navigate`.
const NAVIGATE_SLACK: Duration = Duration::from_secs(5);
/// Browser startup can be slow on cold caches.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Browser process options passed as capabilities.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Custom Chromium-family binary (e.g. Brave).
    pub binary: Option<PathBuf>,
    pub headless: bool,
    pub extra_args: Vec<String>,
}

/// Creates sessions on a running WebDriver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    endpoint: String,
    options: LaunchOptions,
}

impl WebDriverLauncher {
    pub fn new(endpoint: impl Into<String>, options: LaunchOptions) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            options,
        }
    }

    pub fn from_config(cfg: &BrowserConfig) -> Self {
        Self::new(
            cfg.webdriver_url.clone(),
            LaunchOptions {
                binary: cfg.binary.clone(),
                headless: cfg.headless,
                extra_args: Vec::new(),
            },
        )
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let caps = wire::chrome_capabilities(&self.options);
        let url = format!("{}/session", self.endpoint);
        let resp = http::request_async(Request::post_json(url, &caps, LAUNCH_TIMEOUT))
            .await
            .map_err(|e| BrowserError::Launch(format!("{}: {}", self.endpoint, e)))?;
        let value = wire::parse_response(&resp).map_err(|e| match e {
            BrowserError::Launch(_) => e,
            other => BrowserError::Launch(other.to_string()),
        })?;
        let session_id = wire::session_id(&value)
            .ok_or_else(|| BrowserError::Launch("new session response has no sessionId".into()))?;
        tracing::debug!(session = %session_id, endpoint = %self.endpoint, "browser session created");
        Ok(Box::new(WebDriverSession {
            endpoint: self.endpoint.clone(),
            session_id,
            command_timeout: COMMAND_TIMEOUT,
            closed: false,
        }))
    }
}

/// One WebDriver session. Closing deletes the session (and the browser).
#[derive(Debug)]
pub struct WebDriverSession {
    endpoint: String,
    session_id: String,
    command_timeout: Duration,
    closed: bool,
}

impl WebDriverSession {
    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            format!("{}/session/{}", self.endpoint, self.session_id)
        } else {
            format!("{}/session/{}/{}", self.endpoint, self.session_id, path)
        }
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        if self.closed {
            return Err(BrowserError::SessionLost("session already closed".into()));
        }
        let url = self.url(path);
        let req = match (method, body) {
            (Method::Post, body) => Request::post_json(url, &body.unwrap_or_else(|| json!({})), timeout),
            (Method::Delete, _) => Request::delete(url, timeout),
            (Method::Get, _) => Request::get(url, timeout),
        };
        let resp = http::request_async(req).await.map_err(transport_error)?;
        wire::parse_response(&resp)
    }

    async fn execute(&self, script: &str) -> Result<Value, BrowserError> {
        self.command(
            Method::Post,
            "execute/sync",
            Some(json!({ "script": script, "args": [] })),
            self.command_timeout,
        )
        .await
    }
}

fn transport_error(e: HttpError) -> BrowserError {
    if e.is_timeout() {
        BrowserError::Timeout(e.to_string())
    } else {
        BrowserError::Transport(e.to_string())
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let ms = timeout.as_millis() as u64;
        self.command(
            Method::Post,
            "timeouts",
            Some(json!({ "pageLoad": ms, "script": ms, "implicit": 0 })),
            COMMAND_TIMEOUT,
        )
        .await?;
        self.command(
            Method::Post,
            "url",
            Some(json!({ "url": url })),
            timeout + NAVIGATE_SLACK,
        )
        .await
        .map(|_| ())
    }

    async fn ready_state(&mut self) -> Result<String, BrowserError> {
        let v = self.execute("return document.readyState;").await?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    async fn find_element(&mut self, css: &str) -> Result<Option<ElementHandle>, BrowserError> {
        let res = self
            .command(
                Method::Post,
                "element",
                Some(json!({ "using": "css selector", "value": css })),
                self.command_timeout,
            )
            .await;
        match res {
            Ok(v) => wire::element_id(&v)
                .map(|id| Some(ElementHandle(id)))
                .ok_or_else(|| BrowserError::Transport("find element: no element id".into())),
            Err(BrowserError::NoSuchElement(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let path = format!("element/{}/attribute/{}", element.0, name);
        let v = self.command(Method::Get, &path, None, self.command_timeout).await?;
        Ok(v.as_str().map(str::to_string))
    }

    async fn switch_to_frame(&mut self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.command(
            Method::Post,
            "frame",
            Some(json!({ "id": wire::element_ref(&element.0) })),
            self.command_timeout,
        )
        .await
        .map(|_| ())
    }

    async fn switch_to_top(&mut self) -> Result<(), BrowserError> {
        self.command(Method::Post, "frame", Some(json!({ "id": null })), COMMAND_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        let v = self.command(Method::Get, "source", None, self.command_timeout).await?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        let res = self.command(Method::Delete, "", None, COMMAND_TIMEOUT).await;
        // The session is unusable either way; never try a second delete from Drop.
        self.closed = true;
        match res {
            Ok(_) | Err(BrowserError::SessionLost(_)) => {
                tracing::debug!(session = %self.session_id, "browser session closed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn set_command_timeout(&mut self, timeout: Duration) {
        self.command_timeout = timeout.min(COMMAND_TIMEOUT);
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let url = self.url("");
        tracing::warn!(session = %self.session_id, "browser session dropped without close; deleting");
        std::thread::spawn(move || {
            if let Err(e) = http::request(&Request::delete(url, COMMAND_TIMEOUT)) {
                tracing::debug!("background session delete failed: {}", e);
            }
        });
    }
}
