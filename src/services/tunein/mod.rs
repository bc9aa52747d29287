//! TuneIn Directory Integration
//!
//! This module wraps the TuneIn public API and the OPML tune endpoint.
//!
//! # Overview
//!
//! - **Types**: raw upstream records (`Items`, `Children`, `body`, `Streams`)
//! - **URLs**: token-parameterized request builders
//! - **Client**: JSON GET collaborator with the headers TuneIn expects
//! - **Normalizer**: raw records into addon media descriptions
//! - **Ids**: the composite `<guideId>---<contextToken>` id format
//!
//! Every upstream URL carries the session `serial` captured by the
//! [`TokenExtractor`](crate::services::token_extractor::TokenExtractor).
//! Without it the API answers with empty payloads.

pub mod client;
pub mod ids;
pub mod normalizer;
pub mod types;
pub mod urls;

/// Source name used for manifest and error prefixes
pub const SOURCE_NAME: &str = "TuneIn";

/// Namespace prefix for every id handed out to addon clients
pub const ID_PREFIX: &str = "tunein_";

/// Addon icon
pub const ICON_URL: &str =
    "https://www.underconsideration.com/brandnew/archives/tunein_2017_logo_2.png";

/// Site origin used for referer/origin headers on the secondary stream probe
pub const SITE_ORIGIN: &str = "https://tunein.com";

// Re-exports for convenience
pub use client::{HttpUpstream, UpstreamClient, UpstreamError};
pub use ids::CompositeId;
pub use normalizer::{normalize, to_media_description};
pub use types::{ItemsResponse, LivePlaylistResponse, RawLiveStream, RawRecord, RawStream, TuneResponse};
pub use urls::TuneInUrls;
