mod config;
mod error;
mod metrics;
mod models;
mod routes;
mod services;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::{
    browser::ChromeLauncher,
    resolver::Resolver,
    session_broker::SessionBroker,
    stream_expansion::StreamExpander,
    token_extractor::TokenExtractor,
    tunein::HttpUpstream,
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub broker: Arc<SessionBroker>,
    pub resolver: Resolver,
    pub start_time: Instant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunein_addon=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting TuneIn Addon v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Public URL: {}", config.base_url);

    // Session token: headless browser -> extractor -> single-flight broker
    let launcher = Arc::new(ChromeLauncher::new(config.browser_path.as_deref()));
    let extractor = Arc::new(TokenExtractor::from_config(launcher, &config));
    let broker = Arc::new(SessionBroker::new(
        extractor,
        config.token_max_attempts,
        config.token_retry_delay(),
    ));
    tracing::info!(
        "Session broker initialized ({} attempts, {}ms apart)",
        config.token_max_attempts,
        config.token_retry_delay_ms
    );

    // Upstream client and stream expansion
    let client = Arc::new(HttpUpstream::new(config.upstream_timeout())?);
    let expander = StreamExpander::new(
        client.clone(),
        config.live_playlist_hosts.clone(),
        config.expansion_concurrency,
        config.probe_timeout(),
    );
    tracing::info!(
        "Stream expansion: hosts {:?}, concurrency {}",
        config.live_playlist_hosts,
        config.expansion_concurrency
    );

    let resolver = Resolver::new(broker.clone(), client, expander, &config);

    // Warm-up acquisition (runs in background)
    if config.warmup_on_start {
        let warmup = broker.clone();
        tokio::spawn(async move {
            if !warmup.acquire().await {
                tracing::error!("Warm-up could not acquire a session token");
            }
        });
        tracing::info!("Session token warm-up started");
    }

    // Build application state
    let state = Arc::new(AppState {
        config,
        broker,
        resolver,
        start_time: Instant::now(),
    });

    // Build router
    let app = Router::new()
        // Health endpoints
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/ready", get(routes::health::ready))
        .route("/live", get(routes::health::live))
        // Addon endpoints
        .route("/manifest.json", get(routes::addon::manifest))
        .route("/catalog/:type/:id", get(routes::addon::catalog))
        .route(
            "/catalog/:type/:id/:extra",
            get(routes::addon::catalog_with_extra),
        )
        .route("/meta/:type/:id", get(routes::addon::meta))
        .route("/stream/:type/:id", get(routes::addon::stream))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
