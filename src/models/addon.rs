use serde::Serialize;

use super::media::{MediaDescription, StreamCandidate};

/// Addon manifest returned once per client at install time
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub resources: Vec<String>,
    pub types: Vec<String>,
    pub id_prefixes: Vec<String>,
    pub icon: String,
    pub catalogs: Vec<CatalogDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub catalog_type: String,
    pub extra: Vec<ExtraField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtraField {
    pub name: String,
}

/// Response for catalog requests
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub metas: Vec<MediaDescription>,
}

/// Response for meta requests
#[derive(Debug, Serialize)]
pub struct MetaResponse {
    pub meta: MediaDescription,
}

/// Response for stream requests
#[derive(Debug, Serialize)]
pub struct StreamsResponse {
    pub streams: Vec<StreamCandidate>,
}
