mod api;
mod config;
mod error;
mod models;
mod services;

use crate::api::AppState;
use crate::config::Config;
use crate::services::{
    DailyTrackSelector, MemoryCache, MusicSource, RedisCache, SelectionSettings, SpotifyClient, TtlCache,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,daily_song=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Redis is optional, covers and responses fall back to process memory
    let cache: Arc<dyn TtlCache> = match config.redis_url.as_deref() {
        Some(url) => match RedisCache::connect(url).await {
            Ok(redis) => {
                tracing::info!("Connected to Redis");
                Arc::new(redis)
            }
            Err(e) => {
                tracing::warn!("Redis unavailable, using in-memory cache: {}", e);
                Arc::new(MemoryCache::new())
            }
        },
        None => Arc::new(MemoryCache::new()),
    };

    let source: Option<Arc<dyn MusicSource>> = match (&config.spotify_client_id, &config.spotify_client_secret) {
        (Some(id), Some(secret)) => Some(Arc::new(SpotifyClient::new(
            id.clone(),
            secret.clone(),
            config.market.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )?)),
        _ => {
            tracing::warn!("Spotify credentials missing, serving fallback picks only");
            None
        }
    };

    let selector = Arc::new(DailyTrackSelector::new(
        source,
        cache.clone(),
        SelectionSettings::from(&config),
    ));

    let app_state = Arc::new(AppState {
        selector,
        cache,
        debug_no_cache: config.debug_no_cache,
        response_cache_ttl: Duration::from_secs(config.response_cache_ttl_secs),
    });

    let app = api::build_router(app_state);

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
