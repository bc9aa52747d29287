//! Stream expansion pipeline
//!
//! TuneIn's tune endpoint returns a list of stream descriptors. Some point
//! at a live playlist host that, when asked, lists more playable URLs. Every
//! descriptor is turned into a task and run through a pool bounded by
//! `concurrency`; results are only aggregated once all tasks are done.
//!
//! Per task the derived entries come first, then the origin descriptor,
//! which is kept whatever the probe outcome. Across tasks the order follows
//! completion, which matches input order when `concurrency` is 1.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::ResolverError;
use crate::metrics;
use crate::models::StreamCandidate;
use crate::services::tunein::{LivePlaylistResponse, RawStream, UpstreamClient, SITE_ORIGIN};

/// Fans out live playlist probes and collects every playable entry
pub struct StreamExpander {
    client: Arc<dyn UpstreamClient>,
    live_playlist_hosts: Vec<String>,
    concurrency: usize,
    probe_timeout: Duration,
}

impl StreamExpander {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        live_playlist_hosts: Vec<String>,
        concurrency: usize,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            client,
            live_playlist_hosts: live_playlist_hosts
                .into_iter()
                .map(|h| h.to_lowercase())
                .collect(),
            concurrency: concurrency.max(1),
            probe_timeout,
        }
    }

    /// Expand the primary stream list
    pub async fn resolve(&self, raw_streams: Vec<RawStream>) -> Result<Vec<StreamCandidate>, ResolverError> {
        if raw_streams.is_empty() {
            return Err(ResolverError::UpstreamEmpty("No Streams Found 1"));
        }

        let tasks: Vec<StreamCandidate> = raw_streams
            .iter()
            .map(|s| StreamCandidate::from_parts(s.url.clone(), s.bitrate, s.media_type.as_deref()))
            .collect();

        debug!(
            "Expanding {} stream descriptors (concurrency {})",
            tasks.len(),
            self.concurrency
        );

        // Drain: collect only returns once every task has finished
        let results: Vec<Vec<StreamCandidate>> = stream::iter(tasks)
            .map(|task| self.expand(task))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let streams: Vec<StreamCandidate> = results.into_iter().flatten().collect();
        if streams.is_empty() {
            return Err(ResolverError::UpstreamEmpty("No Streams Found 2"));
        }
        Ok(streams)
    }

    /// Derived entries followed by the task itself
    async fn expand(&self, task: StreamCandidate) -> Vec<StreamCandidate> {
        let mut out = if self.is_live_playlist(&task.url) {
            self.probe(&task.url).await
        } else {
            Vec::new()
        };
        out.push(task);
        out
    }

    fn is_live_playlist(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        matches!(parsed.scheme(), "http" | "https")
            && parsed
                .host_str()
                .map(|h| self.live_playlist_hosts.iter().any(|allowed| h.eq_ignore_ascii_case(allowed)))
                .unwrap_or(false)
    }

    /// Secondary request; failures degrade to "no expansion"
    async fn probe(&self, url: &str) -> Vec<StreamCandidate> {
        metrics::STREAM_PROBES.inc();

        let referer = format!("{}/", SITE_ORIGIN);
        let headers = [("referer", referer.as_str()), ("origin", SITE_ORIGIN)];

        let body = match self
            .client
            .get_json(url, &headers, Some(self.probe_timeout))
            .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!("Live playlist probe failed for {}: {}", url, e);
                metrics::STREAM_PROBE_FAILURES.inc();
                return Vec::new();
            }
        };

        let playlist: LivePlaylistResponse = match serde_json::from_value(body) {
            Ok(p) => p,
            Err(e) => {
                warn!("Live playlist probe returned unexpected body for {}: {}", url, e);
                metrics::STREAM_PROBE_FAILURES.inc();
                return Vec::new();
            }
        };

        playlist
            .streams
            .into_iter()
            .map(|s| StreamCandidate::from_parts(s.url, s.bandwidth, s.media_type.as_deref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tunein::UpstreamError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned JSON per URL; unknown URLs fail like a network error
    #[derive(Default)]
    struct FakeUpstream {
        responses: HashMap<String, Value>,
        calls: Mutex<Vec<(String, Vec<(String, String)>, Option<Duration>)>>,
    }

    impl FakeUpstream {
        fn with(mut self, url: &str, body: Value) -> Self {
            self.responses.insert(url.to_string(), body);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|c| c.0.clone()).collect()
        }
    }

    #[async_trait]
    impl UpstreamClient for FakeUpstream {
        async fn get_json(
            &self,
            url: &str,
            headers: &[(&str, &str)],
            timeout: Option<Duration>,
        ) -> Result<Value, UpstreamError> {
            self.calls.lock().unwrap().push((
                url.to_string(),
                headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                timeout,
            ));
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| UpstreamError::Network("connection refused".to_string()))
        }
    }

    fn expander(upstream: Arc<FakeUpstream>, concurrency: usize) -> StreamExpander {
        StreamExpander::new(
            upstream,
            vec!["stream.radiotime.com".to_string()],
            concurrency,
            Duration::from_secs(5),
        )
    }

    fn raw(url: &str, bitrate: Option<u64>, media_type: Option<&str>) -> RawStream {
        RawStream {
            url: url.to_string(),
            bitrate,
            media_type: media_type.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_live_playlist_entries_precede_origin() {
        let upstream = Arc::new(FakeUpstream::default().with(
            "https://stream.radiotime.com/X",
            json!({ "Streams": [{ "Url": "u1", "Bandwidth": 64, "MediaType": "mp3" }] }),
        ));

        let streams = expander(upstream.clone(), 1)
            .resolve(vec![raw("https://stream.radiotime.com/X", Some(128), Some("aac"))])
            .await
            .unwrap();

        assert_eq!(
            streams,
            vec![
                StreamCandidate {
                    url: "u1".to_string(),
                    title: "Bitrate: 64".to_string(),
                    tag: vec!["mp3".to_string()],
                },
                StreamCandidate {
                    url: "https://stream.radiotime.com/X".to_string(),
                    title: "Bitrate: 128".to_string(),
                    tag: vec!["aac".to_string()],
                },
            ]
        );

        let calls = upstream.calls.lock().unwrap();
        assert_eq!(calls[0].2, Some(Duration::from_secs(5)));
        assert!(calls[0].1.contains(&("referer".to_string(), "https://tunein.com/".to_string())));
        assert!(calls[0].1.contains(&("origin".to_string(), "https://tunein.com".to_string())));
    }

    #[tokio::test]
    async fn test_other_hosts_pass_through_without_probe() {
        let upstream = Arc::new(FakeUpstream::default());

        let streams = expander(upstream.clone(), 1)
            .resolve(vec![raw("https://other.host/Y", None, None)])
            .await
            .unwrap();

        assert_eq!(
            streams,
            vec![StreamCandidate {
                url: "https://other.host/Y".to_string(),
                title: String::new(),
                tag: vec!["mp3".to_string()],
            }]
        );
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_rejects_without_work() {
        let upstream = Arc::new(FakeUpstream::default());

        let err = expander(upstream.clone(), 1).resolve(Vec::new()).await.unwrap_err();

        assert_eq!(err, ResolverError::UpstreamEmpty("No Streams Found 1"));
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_probe_keeps_origin() {
        let upstream = Arc::new(FakeUpstream::default());

        let streams = expander(upstream.clone(), 1)
            .resolve(vec![raw("https://stream.radiotime.com/down", Some(32), None)])
            .await
            .unwrap();

        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].url, "https://stream.radiotime.com/down");
        assert_eq!(upstream.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_probe_with_unexpected_body_keeps_origin() {
        let upstream = Arc::new(
            FakeUpstream::default().with("https://stream.radiotime.com/odd", json!(["not", "an", "object"])),
        );

        let streams = expander(upstream, 1)
            .resolve(vec![raw("https://stream.radiotime.com/odd", None, None)])
            .await
            .unwrap();

        assert_eq!(streams.len(), 1);
    }

    #[tokio::test]
    async fn test_serialized_pool_preserves_input_order() {
        let upstream = Arc::new(
            FakeUpstream::default()
                .with(
                    "https://stream.radiotime.com/A",
                    json!({ "Streams": [{ "Url": "a1" }, { "Url": "a2", "Bandwidth": 96 }] }),
                )
                .with("https://stream.radiotime.com/B", json!({ "Streams": [] })),
        );

        let streams = expander(upstream, 1)
            .resolve(vec![
                raw("https://stream.radiotime.com/A", None, None),
                raw("http://plain.example/C", Some(128), Some("aac")),
                raw("https://stream.radiotime.com/B", None, Some("ogg")),
            ])
            .await
            .unwrap();

        let urls: Vec<&str> = streams.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "a1",
                "a2",
                "https://stream.radiotime.com/A",
                "http://plain.example/C",
                "https://stream.radiotime.com/B",
            ]
        );
        assert_eq!(streams[1].title, "Bitrate: 96");
        assert_eq!(streams[4].tag, vec!["ogg".to_string()]);
    }

    #[tokio::test]
    async fn test_parallel_pool_collects_everything() {
        let mut upstream = FakeUpstream::default();
        let mut input = Vec::new();
        for i in 0..8 {
            let url = format!("https://stream.radiotime.com/{}", i);
            upstream = upstream.with(&url, json!({ "Streams": [{ "Url": format!("derived-{}", i) }] }));
            input.push(raw(&url, None, None));
        }
        let upstream = Arc::new(upstream);

        let streams = expander(upstream.clone(), 4).resolve(input).await.unwrap();

        assert_eq!(streams.len(), 16);
        assert_eq!(upstream.calls().len(), 8);
        // Within each task the derived entry comes right before its origin
        for pair in streams.chunks(2) {
            let suffix = pair[1].url.rsplit('/').next().unwrap();
            assert_eq!(pair[0].url, format!("derived-{}", suffix));
        }
    }

    #[test]
    fn test_live_playlist_host_matching() {
        let e = expander(Arc::new(FakeUpstream::default()), 1);
        assert!(e.is_live_playlist("https://stream.radiotime.com/listen.stream?id=1"));
        assert!(e.is_live_playlist("http://STREAM.radiotime.com/x"));
        assert!(!e.is_live_playlist("https://stream.radiotime.com.evil.net/x"));
        assert!(!e.is_live_playlist("https://other.host/stream.radiotime.com/"));
        assert!(!e.is_live_playlist("not a url"));
    }
}
