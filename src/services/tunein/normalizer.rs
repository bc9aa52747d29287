//! Raw record normalization
//!
//! Maps TuneIn directory records into [`MediaItem`]s and then into the
//! public [`MediaDescription`] shape.

use std::collections::BTreeSet;

use super::ids::CompositeId;
use super::types::RawRecord;
use super::ID_PREFIX;
use crate::models::{MediaDescription, MediaItem};

/// Normalize raw records into media items.
///
/// Some categories wrap the station one level deep; a record with exactly
/// one child is replaced by that child.
pub fn normalize(records: &[RawRecord]) -> Vec<MediaItem> {
    records.iter().map(normalize_record).collect()
}

fn normalize_record(record: &RawRecord) -> MediaItem {
    let record = match record.children() {
        [only] => only,
        _ => record,
    };

    let id = CompositeId::new(
        record.guide_id.as_deref().unwrap_or(""),
        record.context_token(),
    );

    MediaItem {
        id: id.to_string(),
        title: record.title.clone().unwrap_or_default(),
        thumbnail_url: record.image.clone().unwrap_or_default(),
        tags: BTreeSet::new(),
    }
}

/// Build the public description for an item.
///
/// `id_override` replaces the item id, used when the caller already knows
/// the id it was asked about.
pub fn to_media_description(item: &MediaItem, id_override: Option<&CompositeId>) -> MediaDescription {
    let id = match id_override {
        Some(id) => id.namespaced(),
        None => format!("{}{}", ID_PREFIX, item.id),
    };
    let thumb = item.thumbnail_url.clone();

    MediaDescription {
        id,
        name: html_escape::decode_html_entities(&item.title).into_owned(),
        poster: thumb.clone(),
        logo: thumb.clone(),
        background: thumb,
        genre: vec!["Radio".to_string()],
        media_type: "tv".to_string(),
        poster_shape: "square".to_string(),
        background_shape: "contain".to_string(),
        is_free: true,
        popularity: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tunein::ids::ID_SEPARATOR;
    use crate::services::tunein::types::RawContext;

    /// Flat raw record carrying a normalized item's fields
    fn to_raw(item: &MediaItem) -> RawRecord {
        let (guide_id, token) = item
            .id
            .split_once(ID_SEPARATOR)
            .unwrap_or((item.id.as_str(), ""));

        RawRecord {
            guide_id: Some(guide_id.to_string()),
            title: Some(item.title.clone()),
            image: Some(item.thumbnail_url.clone()),
            context: Some(RawContext {
                token: Some(token.to_string()),
            }),
            children: None,
        }
    }

    fn record(guide_id: &str, title: Option<&str>, image: Option<&str>, token: &str) -> RawRecord {
        RawRecord {
            guide_id: Some(guide_id.to_string()),
            title: title.map(str::to_string),
            image: image.map(str::to_string),
            context: Some(RawContext {
                token: Some(token.to_string()),
            }),
            children: None,
        }
    }

    #[test]
    fn test_normalize_flat_record() {
        let items = normalize(&[record("s1", Some("Jazz FM"), Some("http://img/1"), "tok1")]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "s1---tok1");
        assert_eq!(items[0].title, "Jazz FM");
        assert_eq!(items[0].thumbnail_url, "http://img/1");
        assert!(items[0].tags.is_empty());
    }

    #[test]
    fn test_normalize_defaults_missing_fields() {
        let raw = RawRecord {
            guide_id: Some("s2".to_string()),
            ..Default::default()
        };
        let items = normalize(&[raw]);
        assert_eq!(items[0].id, "s2---");
        assert_eq!(items[0].title, "");
        assert_eq!(items[0].thumbnail_url, "");
    }

    #[test]
    fn test_normalize_unwraps_single_child() {
        let wrapper = RawRecord {
            guide_id: Some("c100".to_string()),
            title: Some("Wrapper".to_string()),
            children: Some(vec![record("s3", Some("Inner"), None, "tok3")]),
            ..Default::default()
        };
        let items = normalize(&[wrapper]);
        assert_eq!(items[0].id, "s3---tok3");
        assert_eq!(items[0].title, "Inner");
    }

    #[test]
    fn test_normalize_keeps_multi_child_record() {
        let wrapper = RawRecord {
            guide_id: Some("c100".to_string()),
            title: Some("Section".to_string()),
            context: Some(RawContext {
                token: Some("ctok".to_string()),
            }),
            children: Some(vec![
                record("s4", None, None, "a"),
                record("s5", None, None, "b"),
            ]),
            ..Default::default()
        };
        let items = normalize(&[wrapper]);
        assert_eq!(items[0].id, "c100---ctok");
    }

    #[test]
    fn test_normalize_idempotent_on_flat_records() {
        let first = normalize(&[
            record("s1", Some("One"), Some("http://img/1"), "t1"),
            record("s2", None, None, "t2"),
        ]);
        let raw_again: Vec<RawRecord> = first.iter().map(to_raw).collect();
        assert_eq!(normalize(&raw_again), first);
    }

    #[test]
    fn test_media_description_round_trips_id() {
        let item = &normalize(&[record("s99", Some("Radio"), None, "ctx99")])[0];
        let desc = to_media_description(item, None);
        assert_eq!(desc.id, "tunein_s99---ctx99");

        let parsed = CompositeId::parse(&desc.id).unwrap();
        assert_eq!(parsed.guide_id, "s99");
        assert_eq!(parsed.context_token, "ctx99");
    }

    #[test]
    fn test_media_description_fields() {
        let item = &normalize(&[record("s1", Some("Rock &amp; Roll &#39;70s"), Some("http://img"), "t")])[0];
        let desc = to_media_description(item, Some(&CompositeId::new("s1", "other")));
        assert_eq!(desc.id, "tunein_s1---other");
        assert_eq!(desc.name, "Rock & Roll '70s");
        assert_eq!(desc.poster, "http://img");
        assert_eq!(desc.logo, "http://img");
        assert_eq!(desc.background, "http://img");
        assert_eq!(desc.genre, vec!["Radio".to_string()]);
        assert_eq!(desc.media_type, "tv");
    }
}
