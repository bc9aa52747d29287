//! TuneIn request URL builders
//!
//! Pure string construction, no I/O. Every URL carries the shared
//! parameter set plus the current session serial.

use lazy_static::lazy_static;
use regex::Regex;

/// Stream formats requested from every endpoint
const FORMATS: &str = "mp3,aac,ogg,flash,html";
const PARTNER_ID: &str = "RadioTime";
const API_VERSION: &str = "2.43";
const API_BUILD: &str = "2.43.0";

lazy_static! {
    /// Matches the serial parameter value for log redaction
    static ref SERIAL_REGEX: Regex = Regex::new(r"serial=[^&]*").unwrap();
}

/// Hosts plus the session serial needed to talk to TuneIn
#[derive(Debug, Clone)]
pub struct TuneInUrls {
    /// API base URL (e.g., "https://api.tunein.com")
    pub api_host: String,
    /// OPML base URL (e.g., "https://opml.radiotime.com")
    pub opml_host: String,
    /// Session token captured from the website
    pub serial: String,
}

impl TuneInUrls {
    pub fn new(api_host: &str, opml_host: &str, serial: &str) -> Self {
        Self {
            api_host: api_host.trim_end_matches('/').to_string(),
            opml_host: opml_host.trim_end_matches('/').to_string(),
            serial: serial.to_string(),
        }
    }

    /// Parameters appended to every request
    fn shared_params(&self) -> String {
        format!(
            "formats={}&serial={}&partnerId={}&version={}&itemUrlScheme=secure&build={}&reqAttempt=1",
            FORMATS, self.serial, PARTNER_ID, API_VERSION, API_BUILD
        )
    }

    /// Trending catalog
    pub fn catalog(&self) -> String {
        format!("{}/categories/trending?{}", self.api_host, self.shared_params())
    }

    /// Full text search
    pub fn search(&self, query: &str) -> String {
        format!(
            "{}/profiles?fullTextSearch=true&query={}&{}",
            self.api_host,
            urlencoding::encode(query),
            self.shared_params()
        )
    }

    /// Primary stream list for a station
    pub fn stream_manifest(&self, channel_id: &str, item_token: &str) -> String {
        format!(
            "{}/Tune.ashx?id={}&render=json&itemToken={}&type=station&{}",
            self.opml_host,
            urlencoding::encode(channel_id),
            urlencoding::encode(item_token),
            self.shared_params()
        )
    }

    /// Profile contents for a station
    pub fn meta_details(&self, channel_id: &str, item_token: &str) -> String {
        format!(
            "{}/profiles/{}/contents?itemToken={}&{}",
            self.api_host,
            urlencoding::encode(channel_id),
            urlencoding::encode(item_token),
            self.shared_params()
        )
    }
}

/// Hide the serial value of a URL before logging it
pub fn redact_serial(url: &str) -> String {
    SERIAL_REGEX.replace_all(url, "serial=***").to_string()
}
