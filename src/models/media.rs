use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Normalized upstream station record
///
/// `id` is the composite `<guideId>---<contextToken>`; both halves are needed
/// later to rebuild meta and stream requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub tags: BTreeSet<String>,
}

/// Public media description served to addon clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescription {
    pub id: String,
    pub name: String,
    pub poster: String,
    pub logo: String,
    pub background: String,
    pub genre: Vec<String>,
    #[serde(rename = "type")]
    pub media_type: String,
    pub poster_shape: String,
    pub background_shape: String,
    pub is_free: bool,
    pub popularity: u32,
}

/// Playable stream entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCandidate {
    pub url: String,
    pub title: String,
    pub tag: Vec<String>,
}

impl StreamCandidate {
    /// Build a candidate from upstream fields.
    ///
    /// The title is `"Bitrate: <n>"` when a non-zero bitrate is known, empty otherwise,
    /// and the media type tag falls back to `mp3`.
    pub fn from_parts(url: impl Into<String>, bitrate: Option<u64>, media_type: Option<&str>) -> Self {
        let title = bitrate
            .filter(|b| *b > 0)
            .map(|b| format!("Bitrate: {}", b))
            .unwrap_or_default();
        let tag = media_type
            .filter(|t| !t.is_empty())
            .unwrap_or("mp3")
            .to_string();

        Self {
            url: url.into(),
            title,
            tag: vec![tag],
        }
    }
}
