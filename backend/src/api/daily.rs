use crate::error::{AppError, Result};
use crate::models::{DailyPicksResponse, PickSource, SelectionMode};
use crate::services::daily_seed::resolve_target_date;
use crate::services::{DailyTrackSelector, TtlCache};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const CACHE_CONTROL_PUBLIC: &str = "public, max-age=300, s-maxage=3600, stale-while-revalidate=86400";
const CACHE_CONTROL_NO_STORE: &str = "no-store, max-age=0";

pub struct AppState {
    pub selector: Arc<DailyTrackSelector>,
    pub cache: Arc<dyn TtlCache>,
    /// Force `no-store` and bypass the response cache for every request
    pub debug_no_cache: bool,
    pub response_cache_ttl: Duration,
}

#[derive(Debug, Default, Deserialize)]
pub struct DailySongQuery {
    pub date: Option<String>,
    pub debug: Option<String>,
    pub mode: Option<String>,
    /// Cache buster, only its presence matters
    pub ts: Option<String>,
}

impl DailySongQuery {
    fn wants_debug(&self) -> bool {
        matches!(self.debug.as_deref(), Some("1") | Some("true"))
    }
}

pub fn daily_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/daily-song", get(daily_song).options(preflight))
        .route("/health", get(health))
}

fn parse_mode(raw: Option<&str>) -> Result<Option<SelectionMode>> {
    match raw.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(None),
        Some("seed") => Ok(Some(SelectionMode::Seed)),
        Some("playlist") | Some("global") => Ok(Some(SelectionMode::Playlist)),
        Some(other) => Err(AppError::Validation(format!(
            "Unknown mode '{}', expected 'seed' or 'playlist'",
            other
        ))),
    }
}

fn response_cache_key(date: &str, mode: SelectionMode) -> String {
    format!("daily-song:{}:{}", date, mode.as_str())
}

async fn daily_song(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailySongQuery>,
) -> Result<Response> {
    let requested_mode = parse_mode(query.mode.as_deref())?;
    let no_cache = state.debug_no_cache || query.debug.is_some() || query.ts.is_some();

    let today = Utc::now().date_naive();
    let date = resolve_target_date(query.date.as_deref(), today);
    let key = response_cache_key(
        &date.format("%Y-%m-%d").to_string(),
        state.selector.resolve_mode(requested_mode),
    );

    if !no_cache {
        if let Some(cached) = read_cached(state.cache.as_ref(), &key).await {
            tracing::debug!("Serving {} from response cache", key);
            return Ok(respond(cached, false));
        }
    }

    let mut response = state.selector.daily_picks(date, requested_mode).await;
    if !query.wants_debug() {
        response.debug = None;
    }

    if !no_cache && response.source == PickSource::Spotify {
        store_cached(state.cache.as_ref(), &key, &response, state.response_cache_ttl).await;
    }

    Ok(respond(response, no_cache))
}

async fn read_cached(cache: &dyn TtlCache, key: &str) -> Option<DailyPicksResponse> {
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!("Discarding unreadable cached response {}: {}", key, e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Response cache read failed: {}", e);
            None
        }
    }
}

async fn store_cached(cache: &dyn TtlCache, key: &str, response: &DailyPicksResponse, ttl: Duration) {
    let raw = match serde_json::to_string(response) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Failed to serialize response for cache: {}", e);
            return;
        }
    };

    if let Err(e) = cache.set(key, &raw, ttl).await {
        tracing::warn!("Response cache write failed: {}", e);
    }
}

fn respond(body: DailyPicksResponse, no_cache: bool) -> Response {
    let cache_control = if no_cache {
        CACHE_CONTROL_NO_STORE
    } else {
        CACHE_CONTROL_PUBLIC
    };

    ([(header::CACHE_CONTROL, cache_control)], Json(body)).into_response()
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
