//! Headless browser collaborator
//!
//! The session serial is only ever handed out to a real browser, so it is
//! captured by loading the website and watching outbound requests.
//!
//! - [`BrowserLauncher`] starts one isolated session
//! - [`BrowserSession`] exposes request observation, navigation and teardown
//! - [`cdp::ChromeLauncher`] implements both over the Chrome DevTools Protocol

pub mod cdp;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub use cdp::ChromeLauncher;

/// Settings for a single browser session
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// User agent presented to the website
    pub user_agent: String,
    pub load_images: bool,
    /// Disable same-origin checks and accept any TLS certificate
    pub disable_security: bool,
    /// Refuse any main-frame navigation after the first document
    pub lock_navigation: bool,
    pub clear_cache: bool,
    /// Upper bound for one page load
    pub navigation_timeout: Duration,
}

/// Browser automation errors
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("No browser executable found")]
    NotFound,
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("DevTools protocol error: {0}")]
    Protocol(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Navigation timed out after {0:?}")]
    Timeout(Duration),
}

/// Starts isolated browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One running browser with a single page
#[async_trait]
pub trait BrowserSession: Send {
    /// Receiver of every outbound request URL issued by the page, in order.
    ///
    /// Only one observer is supported; a second call replaces the first.
    fn observe_requests(&mut self) -> mpsc::UnboundedReceiver<String>;

    /// Load `url` and wait for the load event
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Close the page, then terminate the browser process
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}
