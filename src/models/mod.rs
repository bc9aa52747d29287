//! Addon data shapes
//!
//! Value types shared between the resolver services and the HTTP routes.

pub mod addon;
pub mod media;

pub use addon::{
    CatalogDescriptor, CatalogResponse, ExtraField, Manifest, MetaResponse, StreamsResponse,
};
pub use media::{MediaDescription, MediaItem, StreamCandidate};
