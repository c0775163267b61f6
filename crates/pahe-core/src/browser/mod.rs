//! Browser automation surface used by the stream resolver.
//!
//! The resolver depends only on [`BrowserLauncher`] and [`BrowserSession`];
//! [`webdriver`] implements them over the W3C WebDriver wire protocol, and
//! tests substitute scripted fakes.

pub mod webdriver;

pub use webdriver::{LaunchOptions, WebDriverLauncher, WebDriverSession};

use async_trait::async_trait;
use std::time::Duration;

/// Opaque reference to a DOM element inside the current browsing context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// Wire-level browser failure. The resolver maps these to its own taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrowserError {
    /// Page load, script or command exceeded its deadline.
    #[error("browser timeout: {0}")]
    Timeout(String),
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("no such frame: {0}")]
    NoSuchFrame(String),
    /// The session is gone (browser crashed or was closed underneath us).
    #[error("browser session lost: {0}")]
    SessionLost(String),
    /// A session could not be created.
    #[error("browser launch failed: {0}")]
    Launch(String),
    /// The driver endpoint could not be reached or answered garbage.
    #[error("webdriver transport error: {0}")]
    Transport(String),
    /// Any other error reported by the driver.
    #[error("webdriver error {error}: {message}")]
    Protocol { error: String, message: String },
}

/// One live browser session. Exclusively owned by whoever launched it.
///
/// `close` must be called on every exit path; it is idempotent.
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url` in the top-level context, waiting at most `timeout` for the load.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// `document.readyState` of the current browsing context.
    async fn ready_state(&mut self) -> Result<String, BrowserError>;

    /// First element matching a CSS selector, `None` when nothing matches.
    async fn find_element(&mut self, css: &str) -> Result<Option<ElementHandle>, BrowserError>;

    async fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    /// Makes the frame `element` the current browsing context.
    async fn switch_to_frame(&mut self, element: &ElementHandle) -> Result<(), BrowserError>;

    /// Returns to the top-level document.
    async fn switch_to_top(&mut self) -> Result<(), BrowserError>;

    /// Serialized DOM of the current browsing context.
    async fn page_source(&mut self) -> Result<String, BrowserError>;

    async fn close(&mut self) -> Result<(), BrowserError>;

    /// Upper bound for each subsequent element, frame and source command.
    /// Sessions without a transport-level timeout may ignore it.
    fn set_command_timeout(&mut self, _timeout: Duration) {}
}

/// Creates browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}
