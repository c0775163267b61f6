//! Blocking HTTP requests over libcurl.
//!
//! Shared by the catalog client and the WebDriver client. Every call runs on
//! the current thread; use [`request_async`] (or `spawn_blocking`) from async
//! code.

use std::str;
use std::time::Duration;

/// HTTP method subset used by the catalog API and the WebDriver wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// One outgoing request. Headers are `(name, value)` pairs.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl Request {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn post_json(url: impl Into<String>, body: &serde_json::Value, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![(
                "Content-Type".to_string(),
                "application/json; charset=utf-8".to_string(),
            )],
            body: Some(body.to_string().into_bytes()),
            timeout,
        }
    }

    pub fn delete(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Delete,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Status, raw body and lowercased response headers of a completed request.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u32,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header with the given (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Performs one request. Follows redirects; a non-2xx status is *not* an
/// error here, callers inspect [`Response::status`].
pub fn request(req: &Request) -> Result<Response, curl::Error> {
    let mut body_out: Vec<u8> = Vec::new();
    let mut raw_headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(&req.url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(req.timeout.min(Duration::from_secs(15)))?;
    easy.timeout(req.timeout)?;

    match req.method {
        Method::Get => easy.get(true)?,
        Method::Post => {
            easy.post(true)?;
            easy.post_fields_copy(req.body.as_deref().unwrap_or_default())?;
        }
        Method::Delete => easy.custom_request("DELETE")?,
    }

    let mut list = curl::easy::List::new();
    for (k, v) in &req.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !req.headers.is_empty() {
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                raw_headers.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            body_out.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    Ok(Response {
        status,
        body: body_out,
        headers: parse_header_lines(&raw_headers),
    })
}

/// Failure of [`request_async`]: either curl itself or the blocking worker.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error(transparent)]
    Curl(#[from] curl::Error),
    #[error("http worker failed: {0}")]
    Worker(String),
}

impl HttpError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Curl(e) if e.is_operation_timedout())
    }
}

/// Runs [`request`] on the blocking pool.
pub async fn request_async(req: Request) -> Result<Response, HttpError> {
    tokio::task::spawn_blocking(move || request(&req))
        .await
        .map_err(|e| HttpError::Worker(e.to_string()))?
        .map_err(HttpError::from)
}

/// Keeps `name: value` lines of the *last* response block (after redirects),
/// lowercasing names.
fn parse_header_lines(lines: &[String]) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in lines {
        if line.starts_with("HTTP/") {
            out.clear();
            continue;
        }
        if let Some((k, v)) = line.split_once(':') {
            out.push((k.trim().to_ascii_lowercase(), v.trim().to_string()));
        }
    }
    out
}
