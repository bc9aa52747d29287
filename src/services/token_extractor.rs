//! Session token capture
//!
//! Loads the TuneIn website in a throwaway browser and picks the `serial`
//! parameter out of the first request the page makes to the OPML host.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::metrics;
use crate::services::browser::{BrowserLauncher, LaunchOptions};

lazy_static! {
    /// `serial` query parameter, value up to the next `&` (or end)
    static ref SERIAL_REGEX: Regex = Regex::new(r"[?&]serial=([^&#]+)").unwrap();
}

/// Anything that can produce a fresh session token
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// One extraction attempt; `None` when no token was observed
    async fn run(&self) -> Option<String>;
}

/// Browser-driven token extractor
pub struct TokenExtractor {
    launcher: Arc<dyn BrowserLauncher>,
    options: LaunchOptions,
    entry_url: String,
    token_host: String,
}

impl TokenExtractor {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        options: LaunchOptions,
        entry_url: &str,
        token_host: &str,
    ) -> Self {
        Self {
            launcher,
            options,
            entry_url: entry_url.to_string(),
            token_host: token_host.to_lowercase(),
        }
    }

    /// Extractor configured from application settings
    pub fn from_config(launcher: Arc<dyn BrowserLauncher>, config: &Config) -> Self {
        let options = LaunchOptions {
            user_agent: config.browser_user_agent.clone(),
            load_images: false,
            disable_security: true,
            lock_navigation: true,
            clear_cache: true,
            navigation_timeout: config.navigation_timeout(),
        };
        Self::new(launcher, options, &config.entry_url, &config.token_host)
    }
}

#[async_trait]
impl TokenSource for TokenExtractor {
    async fn run(&self) -> Option<String> {
        metrics::EXTRACTOR_RUNS.inc();

        let mut session = match self.launcher.launch(&self.options).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Token extractor: browser launch failed: {}", e);
                metrics::EXTRACTOR_FAILURES.inc();
                return None;
            }
        };

        let mut requests = session.observe_requests();
        let navigation = session.navigate(&self.entry_url).await;

        let mut token = None;
        while let Ok(request_url) = requests.try_recv() {
            if token.is_none() {
                token = extract_serial(&request_url, &self.token_host);
            }
        }

        // Teardown runs exactly once, whatever the navigation outcome
        if let Err(e) = session.close().await {
            debug!("Token extractor: browser teardown reported: {}", e);
        }

        let token = match navigation {
            Ok(()) => token,
            Err(e) => {
                warn!("Token extractor: navigation to {} failed: {}", self.entry_url, e);
                None
            }
        };

        match &token {
            Some(_) => info!("Token extractor: session serial captured"),
            None => metrics::EXTRACTOR_FAILURES.inc(),
        }
        token
    }
}

/// Extract the `serial` value from a request to `token_host`
pub fn extract_serial(request_url: &str, token_host: &str) -> Option<String> {
    let parsed = Url::parse(request_url).ok()?;
    if !parsed
        .host_str()
        .map(|h| h.eq_ignore_ascii_case(token_host))
        .unwrap_or(false)
    {
        return None;
    }

    SERIAL_REGEX
        .captures(request_url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::browser::{BrowserError, BrowserSession};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn test_extract_serial_from_opml_request() {
        let url = "https://opml.radiotime.com/Browse.ashx?render=json&serial=5f1c-99ab&partnerId=RadioTime";
        assert_eq!(
            extract_serial(url, "opml.radiotime.com"),
            Some("5f1c-99ab".to_string())
        );
    }

    #[test]
    fn test_extract_serial_at_end_of_url() {
        let url = "https://opml.radiotime.com/Tune.ashx?id=s1&serial=abc";
        assert_eq!(extract_serial(url, "opml.radiotime.com"), Some("abc".to_string()));
    }

    #[test]
    fn test_extract_serial_other_host_ignored() {
        let url = "https://api.tunein.com/profiles?serial=abc";
        assert_eq!(extract_serial(url, "opml.radiotime.com"), None);
    }

    #[test]
    fn test_extract_serial_is_case_sensitive_and_exact() {
        assert_eq!(
            extract_serial("https://opml.radiotime.com/x?Serial=abc", "opml.radiotime.com"),
            None
        );
        assert_eq!(
            extract_serial("https://opml.radiotime.com/x?myserial=abc", "opml.radiotime.com"),
            None
        );
        assert_eq!(
            extract_serial("https://opml.radiotime.com/x?serial=&a=1", "opml.radiotime.com"),
            None
        );
    }

    /// Scripted browser: replays a fixed list of request URLs on navigation
    struct FakeLauncher {
        requests: Vec<String>,
        fail_navigation: bool,
        fail_launch: bool,
        closes: Arc<AtomicUsize>,
        navigated: Arc<Mutex<Vec<String>>>,
    }

    impl FakeLauncher {
        fn new(requests: &[&str]) -> Self {
            Self {
                requests: requests.iter().map(|s| s.to_string()).collect(),
                fail_navigation: false,
                fail_launch: false,
                closes: Arc::new(AtomicUsize::new(0)),
                navigated: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    struct FakeSession {
        requests: Vec<String>,
        fail_navigation: bool,
        observer: Option<mpsc::UnboundedSender<String>>,
        closes: Arc<AtomicUsize>,
        navigated: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
            if self.fail_launch {
                return Err(BrowserError::NotFound);
            }
            Ok(Box::new(FakeSession {
                requests: self.requests.clone(),
                fail_navigation: self.fail_navigation,
                observer: None,
                closes: self.closes.clone(),
                navigated: self.navigated.clone(),
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        fn observe_requests(&mut self) -> mpsc::UnboundedReceiver<String> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.observer = Some(tx);
            rx
        }

        async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
            self.navigated.lock().unwrap().push(url.to_string());
            if let Some(tx) = &self.observer {
                for request in &self.requests {
                    tx.send(request.clone()).unwrap();
                }
            }
            if self.fail_navigation {
                Err(BrowserError::Navigation("net::ERR_FAILED".to_string()))
            } else {
                Ok(())
            }
        }

        async fn close(self: Box<Self>) -> Result<(), BrowserError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn extractor(launcher: FakeLauncher) -> TokenExtractor {
        let options = LaunchOptions {
            user_agent: "UA".to_string(),
            load_images: false,
            disable_security: true,
            lock_navigation: true,
            clear_cache: true,
            navigation_timeout: Duration::from_secs(1),
        };
        TokenExtractor::new(Arc::new(launcher), options, "https://tunein.com/", "opml.radiotime.com")
    }

    #[tokio::test]
    async fn test_run_returns_first_matching_serial() {
        let launcher = FakeLauncher::new(&[
            "https://tunein.com/static/app.js",
            "https://api.tunein.com/profiles?serial=not-this-one",
            "https://opml.radiotime.com/Browse.ashx?c=local&serial=first-1",
            "https://opml.radiotime.com/Browse.ashx?c=music&serial=second-2",
        ]);
        let closes = launcher.closes.clone();
        let navigated = launcher.navigated.clone();

        let token = extractor(launcher).run().await;

        assert_eq!(token, Some("first-1".to_string()));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(*navigated.lock().unwrap(), vec!["https://tunein.com/".to_string()]);
    }

    #[tokio::test]
    async fn test_run_without_matching_request_returns_none() {
        let launcher = FakeLauncher::new(&["https://tunein.com/static/app.js"]);
        let closes = launcher.closes.clone();

        assert_eq!(extractor(launcher).run().await, None);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigation_error_still_tears_down() {
        let mut launcher = FakeLauncher::new(&["https://opml.radiotime.com/x?serial=abc"]);
        launcher.fail_navigation = true;
        let closes = launcher.closes.clone();

        assert_eq!(extractor(launcher).run().await, None);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_returns_none() {
        let mut launcher = FakeLauncher::new(&[]);
        launcher.fail_launch = true;
        let closes = launcher.closes.clone();

        assert_eq!(extractor(launcher).run().await, None);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }
}
