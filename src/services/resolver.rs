//! Addon resource resolution
//!
//! Ties the session broker, the URL builders, the upstream client and the
//! normalizer / stream expansion together for the three addon resources.
//! Every call first waits for a session serial.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ResolverError;
use crate::models::{MediaDescription, StreamCandidate};
use crate::services::session_broker::SessionBroker;
use crate::services::stream_expansion::StreamExpander;
use crate::services::tunein::urls::redact_serial;
use crate::services::tunein::{
    normalize, to_media_description, CompositeId, ItemsResponse, TuneInUrls, TuneResponse,
    UpstreamClient,
};

/// Title of the profile section holding the station record
const STATIONS_SECTION: &str = "Stations";

pub struct Resolver {
    broker: Arc<SessionBroker>,
    client: Arc<dyn UpstreamClient>,
    expander: StreamExpander,
    api_host: String,
    opml_host: String,
    page_size: usize,
}

impl Resolver {
    pub fn new(
        broker: Arc<SessionBroker>,
        client: Arc<dyn UpstreamClient>,
        expander: StreamExpander,
        config: &Config,
    ) -> Self {
        Self {
            broker,
            client,
            expander,
            api_host: config.api_host.clone(),
            opml_host: config.opml_host.clone(),
            page_size: config.page_size,
        }
    }

    /// URL builders bound to the current session serial
    async fn session_urls(&self) -> Result<TuneInUrls, ResolverError> {
        let serial = self
            .broker
            .acquire_token()
            .await
            .ok_or(ResolverError::CredentialUnavailable)?;
        Ok(TuneInUrls::new(&self.api_host, &self.opml_host, &serial))
    }

    /// Primary upstream GET. Transport and parse failures are logged and
    /// reported as `None`, the same as an empty body.
    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Option<T> {
        let headers = [("referer", url), ("origin", self.api_host.as_str())];

        let body = match self.client.get_json(url, &headers, None).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Upstream request failed for {}: {}", redact_serial(url), e);
                return None;
            }
        };

        match serde_json::from_value(body) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Unexpected upstream body for {}: {}", redact_serial(url), e);
                None
            }
        }
    }

    /// Trending catalog, or search results when `search` is set
    pub async fn catalog(
        &self,
        search: Option<&str>,
        skip: usize,
    ) -> Result<Vec<MediaDescription>, ResolverError> {
        let urls = self.session_urls().await?;

        let items = match search.filter(|q| !q.trim().is_empty()) {
            Some(query) => {
                debug!("Catalog search: {}", query);
                let response: ItemsResponse = self
                    .fetch(&urls.search(query))
                    .await
                    .filter(|r: &ItemsResponse| !r.items.is_empty())
                    .ok_or(ResolverError::UpstreamEmpty("No Response Body 2"))?;
                normalize(&response.items)
            }
            None => {
                let response: ItemsResponse = self
                    .fetch(&urls.catalog())
                    .await
                    .ok_or(ResolverError::UpstreamEmpty("No Response Body 1"))?;
                let children = response
                    .items
                    .first()
                    .map(|section| section.children())
                    .filter(|children| !children.is_empty())
                    .ok_or(ResolverError::UpstreamEmpty("No Response Body 1"))?;
                normalize(children)
            }
        };

        Ok(paginate(items, skip, self.page_size)
            .iter()
            .map(|item| to_media_description(item, None))
            .collect())
    }

    /// Details for one station id
    pub async fn meta(&self, id: &str) -> Result<MediaDescription, ResolverError> {
        let urls = self.session_urls().await?;
        let id = CompositeId::parse(id).ok_or(ResolverError::InvalidId)?;

        let response: ItemsResponse = self
            .fetch(&urls.meta_details(&id.guide_id, &id.context_token))
            .await
            .filter(|r: &ItemsResponse| !r.items.is_empty())
            .ok_or(ResolverError::UpstreamEmpty("No Meta Found 1"))?;

        let station = response
            .items
            .iter()
            .filter(|section| section.title.as_deref() == Some(STATIONS_SECTION))
            .filter_map(|section| section.children().first())
            .last()
            .ok_or(ResolverError::UpstreamEmpty("No Meta Found 2"))?;

        let item = normalize(std::slice::from_ref(station))
            .into_iter()
            .next()
            .ok_or(ResolverError::UpstreamEmpty("No Meta Found 2"))?;

        Ok(to_media_description(&item, Some(&id)))
    }

    /// Playable streams for one station id
    pub async fn streams(&self, id: &str) -> Result<Vec<StreamCandidate>, ResolverError> {
        let urls = self.session_urls().await?;
        let id = CompositeId::parse(id).ok_or(ResolverError::InvalidId)?;

        let response: TuneResponse = self
            .fetch(&urls.stream_manifest(&id.guide_id, &id.context_token))
            .await
            .ok_or(ResolverError::UpstreamEmpty("No Streams Found 1"))?;

        self.expander.resolve(response.body).await
    }
}

/// Fixed-size page `[skip, skip + page_size)`
pub fn paginate<T>(items: Vec<T>, skip: usize, page_size: usize) -> Vec<T> {
    items.into_iter().skip(skip).take(page_size).collect()
}
