//! Addon protocol routes
//!
//! Resource paths end in `.json`; the path parameters are captured whole
//! and the suffix is stripped here.

use axum::{
    extract::{Path, State},
    http::Uri,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::error::ResolverError;
use crate::metrics::RESOURCE_REQUESTS;
use crate::models::{
    CatalogDescriptor, CatalogResponse, ExtraField, Manifest, MetaResponse, StreamsResponse,
};
use crate::services::tunein::{ICON_URL, ID_PREFIX, SOURCE_NAME};
use crate::AppState;

const CATALOG_ID: &str = "tunein_cat";
const MEDIA_TYPE: &str = "tv";

// ============================================================================
// Helper Functions
// ============================================================================

/// Drop a trailing `.json` from a path segment
fn strip_json_suffix(segment: &str) -> &str {
    segment.strip_suffix(".json").unwrap_or(segment)
}

/// Last path segment as sent by the client, still percent-encoded
fn raw_last_segment(uri: &Uri) -> &str {
    uri.path().rsplit('/').next().unwrap_or_default()
}

/// Catalog extra segment, e.g. `search=jazz&skip=100`.
///
/// Parsed from the encoded segment so that `%26`, `%2B` and `%25` inside a
/// value are decoded exactly once.
#[derive(Debug, Default, PartialEq, Eq)]
struct CatalogExtra {
    search: Option<String>,
    skip: usize,
}

impl CatalogExtra {
    fn parse(raw: &str) -> Self {
        let mut extra = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "search" if !value.trim().is_empty() => extra.search = Some(value.into_owned()),
                // Unparseable skip falls back to the first page
                "skip" => extra.skip = value.parse().unwrap_or(0),
                _ => {}
            }
        }
        extra
    }
}

fn record<T>(resource: &str, result: &Result<T, ResolverError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(ResolverError::CredentialUnavailable) => "credential_unavailable",
        Err(ResolverError::UpstreamEmpty(_)) => "empty",
        Err(ResolverError::InvalidId) => "invalid_id",
    };
    RESOURCE_REQUESTS.with_label_values(&[resource, outcome]).inc();
}

/// Manifest served to addon clients
pub fn build_manifest() -> Manifest {
    Manifest {
        id: "org.tunein".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        name: SOURCE_NAME.to_string(),
        description: format!("Radios from {}", SOURCE_NAME),
        resources: vec![
            "stream".to_string(),
            "meta".to_string(),
            "catalog".to_string(),
        ],
        types: vec![MEDIA_TYPE.to_string()],
        id_prefixes: vec![ID_PREFIX.to_string()],
        icon: ICON_URL.to_string(),
        catalogs: vec![CatalogDescriptor {
            id: CATALOG_ID.to_string(),
            name: SOURCE_NAME.to_string(),
            catalog_type: MEDIA_TYPE.to_string(),
            extra: vec![
                ExtraField {
                    name: "search".to_string(),
                },
                ExtraField {
                    name: "skip".to_string(),
                },
            ],
        }],
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /manifest.json
pub async fn manifest() -> impl IntoResponse {
    Json(build_manifest())
}

async fn resolve_catalog(
    state: &AppState,
    catalog_id: &str,
    extra: CatalogExtra,
) -> Result<Json<CatalogResponse>, ResolverError> {
    tracing::debug!(
        "Catalog {} requested (search: {:?}, skip: {})",
        catalog_id,
        extra.search,
        extra.skip
    );
    let result = state
        .resolver
        .catalog(extra.search.as_deref(), extra.skip)
        .await;
    record("catalog", &result);
    Ok(Json(CatalogResponse { metas: result? }))
}

/// GET /catalog/:type/:id.json
pub async fn catalog(
    State(state): State<Arc<AppState>>,
    Path((_media_type, id)): Path<(String, String)>,
) -> Result<Json<CatalogResponse>, ResolverError> {
    resolve_catalog(&state, strip_json_suffix(&id), CatalogExtra::default()).await
}

/// GET /catalog/:type/:id/:extra.json
pub async fn catalog_with_extra(
    State(state): State<Arc<AppState>>,
    Path((_media_type, id, _extra)): Path<(String, String, String)>,
    uri: Uri,
) -> Result<Json<CatalogResponse>, ResolverError> {
    // `Path` has already decoded the segment; decode the raw one instead
    let extra = CatalogExtra::parse(strip_json_suffix(raw_last_segment(&uri)));
    resolve_catalog(&state, &id, extra).await
}

/// GET /meta/:type/:id.json
pub async fn meta(
    State(state): State<Arc<AppState>>,
    Path((_media_type, id)): Path<(String, String)>,
) -> Result<Json<MetaResponse>, ResolverError> {
    let result = state.resolver.meta(strip_json_suffix(&id)).await;
    record("meta", &result);
    Ok(Json(MetaResponse { meta: result? }))
}

/// GET /stream/:type/:id.json
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path((_media_type, id)): Path<(String, String)>,
) -> Result<Json<StreamsResponse>, ResolverError> {
    let result = state.resolver.streams(strip_json_suffix(&id)).await;
    record("stream", &result);
    Ok(Json(StreamsResponse { streams: result? }))
}
