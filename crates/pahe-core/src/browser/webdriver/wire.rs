//! W3C WebDriver JSON payloads.

use serde_json::{json, Value};

use super::LaunchOptions;
use crate::browser::BrowserError;
use crate::http::Response;

/// Web element identifier key from the W3C WebDriver protocol.
pub(super) const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Chromium-family capabilities (chromedriver accepts Brave and friends via `binary`).
pub(super) fn chrome_capabilities(opts: &LaunchOptions) -> Value {
    let mut args: Vec<String> = vec![
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--window-size=1920,1080".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
    ];
    if opts.headless {
        args.push("--headless=new".to_string());
    }
    args.extend(opts.extra_args.iter().cloned());

    let mut chrome = json!({
        "args": args,
        "excludeSwitches": ["enable-automation"],
    });
    if let Some(binary) = &opts.binary {
        chrome["binary"] = Value::String(binary.to_string_lossy().into_owned());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": chrome,
            }
        }
    })
}

/// Maps a W3C error code to a [`BrowserError`].
pub(super) fn error_from_wire(error: &str, message: &str) -> BrowserError {
    let message = message.to_string();
    match error {
        "timeout" | "script timeout" => BrowserError::Timeout(message),
        "no such element" | "stale element reference" => BrowserError::NoSuchElement(message),
        "no such frame" => BrowserError::NoSuchFrame(message),
        "invalid session id" | "no such window" => BrowserError::SessionLost(message),
        "session not created" => BrowserError::Launch(message),
        other => BrowserError::Protocol {
            error: other.to_string(),
            message,
        },
    }
}

/// Extracts `value` from a command response, or the driver's error.
pub(super) fn parse_response(resp: &Response) -> Result<Value, BrowserError> {
    let body: Value = match serde_json::from_slice(&resp.body) {
        Ok(v) => v,
        Err(_) if resp.is_success() && resp.body.is_empty() => return Ok(Value::Null),
        Err(e) => {
            return Err(BrowserError::Transport(format!(
                "HTTP {} with non-JSON body: {}",
                resp.status, e
            )))
        }
    };

    let value = body.get("value").cloned().unwrap_or(Value::Null);
    if resp.is_success() {
        return Ok(value);
    }

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Err(error_from_wire(error, message))
}

/// Element id from a find-element result (W3C key, or the legacy `ELEMENT`).
pub(super) fn element_id(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get("ELEMENT"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Session id from a new-session result (W3C nests it under `value`).
pub(super) fn session_id(value: &Value) -> Option<String> {
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub(super) fn element_ref(id: &str) -> Value {
    json!({ ELEMENT_KEY: id })
}
