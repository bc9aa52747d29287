//! TuneIn API Types
//!
//! Type definitions for the subset of TuneIn responses the addon reads.
//! Everything is optional because the upstream schema is not stable.

use serde::{Deserialize, Deserializer, Serialize};

/// Response of `/categories/...` and `/profiles...` endpoints
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ItemsResponse {
    #[serde(rename = "Items", default)]
    pub items: Vec<RawRecord>,
}

/// One directory record (station, show, or section)
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct RawRecord {
    #[serde(default)]
    pub guide_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub context: Option<RawContext>,
    #[serde(default)]
    pub children: Option<Vec<RawRecord>>,
}

impl RawRecord {
    /// Child records, empty when the record is a leaf
    pub fn children(&self) -> &[RawRecord] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Context token, empty when missing
    pub fn context_token(&self) -> &str {
        self.context
            .as_ref()
            .and_then(|c| c.token.as_deref())
            .unwrap_or("")
    }
}

/// Per-item context carried by TuneIn records
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct RawContext {
    #[serde(default)]
    pub token: Option<String>,
}

/// Response of `Tune.ashx?render=json`
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TuneResponse {
    #[serde(default)]
    pub body: Vec<RawStream>,
}

/// Primary stream descriptor
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RawStream {
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub bitrate: Option<u64>,
    #[serde(default)]
    pub media_type: Option<String>,
}

/// Response of a live playlist host
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LivePlaylistResponse {
    #[serde(rename = "Streams", default)]
    pub streams: Vec<RawLiveStream>,
}

/// Stream entry inside a live playlist
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct RawLiveStream {
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub bandwidth: Option<u64>,
    #[serde(default)]
    pub media_type: Option<String>,
}

/// Accept numbers, numeric strings, or null
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
