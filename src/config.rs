use std::env;
use std::time::Duration;

/// Desktop Chrome user agent presented by the token extraction browser
const DEFAULT_BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/56.0.2924.87 Safari/537.36";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub base_url: String,

    // Upstream
    pub api_host: String,
    pub opml_host: String,
    pub upstream_timeout_ms: u64,
    pub page_size: usize,

    // Session token
    pub entry_url: String,
    pub token_host: String,
    pub token_max_attempts: u32,
    pub token_retry_delay_ms: u64,
    pub navigation_timeout_ms: u64,
    pub browser_path: Option<String>,
    pub browser_user_agent: String,
    pub warmup_on_start: bool,

    // Stream expansion
    pub live_playlist_hosts: Vec<String>,
    pub expansion_concurrency: usize,
    pub probe_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // Server
            port: env::var("PORT")
                .unwrap_or_else(|_| "7020".to_string())
                .parse()
                .unwrap_or(7020),
            base_url: env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:7020".to_string()),

            // Upstream
            api_host: env::var("TUNEIN_API_HOST")
                .unwrap_or_else(|_| "https://api.tunein.com".to_string()),
            opml_host: env::var("TUNEIN_OPML_HOST")
                .unwrap_or_else(|_| "https://opml.radiotime.com".to_string()),
            upstream_timeout_ms: env::var("UPSTREAM_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30_000),
            page_size: env::var("PAGE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),

            // Session token
            entry_url: env::var("TUNEIN_ENTRY_URL")
                .unwrap_or_else(|_| "https://tunein.com/".to_string()),
            token_host: env::var("TOKEN_HOST")
                .unwrap_or_else(|_| "opml.radiotime.com".to_string()),
            token_max_attempts: env::var("TOKEN_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap_or(15),
            token_retry_delay_ms: env::var("TOKEN_RETRY_DELAY_MS")
                .unwrap_or_else(|_| "1500".to_string())
                .parse()
                .unwrap_or(1500),
            navigation_timeout_ms: env::var("NAVIGATION_TIMEOUT_MS")
                .unwrap_or_else(|_| "60000".to_string())
                .parse()
                .unwrap_or(60_000), // 1 minute
            browser_path: env::var("BROWSER_PATH").ok().filter(|p| !p.is_empty()),
            browser_user_agent: env::var("BROWSER_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_BROWSER_USER_AGENT.to_string()),
            warmup_on_start: env::var("WARMUP_ON_START")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),

            // Stream expansion
            live_playlist_hosts: parse_host_list(
                &env::var("LIVE_PLAYLIST_HOSTS")
                    .unwrap_or_else(|_| "stream.radiotime.com".to_string()),
            ),
            expansion_concurrency: env::var("EXPANSION_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(1),
            probe_timeout_ms: env::var("PROBE_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000), // 5 seconds
        }
    }

    pub fn token_retry_delay(&self) -> Duration {
        Duration::from_millis(self.token_retry_delay_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Split a comma separated host list, dropping blanks
fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_list() {
        assert_eq!(
            parse_host_list("stream.radiotime.com, Other.Host ,,"),
            vec!["stream.radiotime.com".to_string(), "other.host".to_string()]
        );
        assert!(parse_host_list("").is_empty());
    }
}
