use crate::error::Result;
use crate::models::{AudioFeatures, Track};
use async_trait::async_trait;
use std::collections::HashMap;

/// Bearer token obtained from the music source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Secondary cover-art lookups, tried after the embedded album image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverLookup<'a> {
    Track(&'a str),
    Album(&'a str),
}

/// Everything the daily selector needs from the outside music catalogue.
///
/// Implementations report failures as errors; the selector decides which
/// stage degrades to an empty result.
#[async_trait]
pub trait MusicSource: Send + Sync {
    async fn authenticate(&self) -> Result<AccessToken>;

    /// Tracks from the given playlists, concatenated in order
    async fn fetch_curated_pool(&self, token: &AccessToken, playlist_ids: &[String]) -> Result<Vec<Track>>;

    async fn fetch_recommendations(&self, token: &AccessToken, seed_ids: &[String]) -> Result<Vec<Track>>;

    async fn fetch_audio_features(
        &self,
        token: &AccessToken,
        track_ids: &[String],
    ) -> Result<HashMap<String, AudioFeatures>>;

    async fn fetch_artist_genres(
        &self,
        token: &AccessToken,
        artist_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>>;

    async fn fetch_cover_fallback(&self, token: &AccessToken, lookup: CoverLookup<'_>) -> Result<Option<String>>;
}
