//! In-memory music source for selector and API tests.

use crate::error::{AppError, Result};
use crate::models::{AudioFeatures, Track};
use crate::services::music_source::{AccessToken, CoverLookup, MusicSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct ScriptedSource {
    pub fail_auth: bool,
    pub fail_pool: bool,
    pub curated: Vec<Track>,
    pub recommendations: Vec<Track>,
    pub features: HashMap<String, AudioFeatures>,
    pub genres: HashMap<String, Vec<String>>,
    pub track_covers: HashMap<String, String>,
    pub album_covers: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MusicSource for ScriptedSource {
    async fn authenticate(&self) -> Result<AccessToken> {
        self.record("authenticate".to_string());
        if self.fail_auth {
            return Err(AppError::AuthenticationFailed("invalid_client".to_string()));
        }
        Ok(AccessToken("test-token".to_string()))
    }

    async fn fetch_curated_pool(&self, _token: &AccessToken, playlist_ids: &[String]) -> Result<Vec<Track>> {
        self.record(format!("playlists:{}", playlist_ids.join(",")));
        if self.fail_pool {
            return Err(AppError::Spotify("timed out".to_string()));
        }
        Ok(self.curated.clone())
    }

    async fn fetch_recommendations(&self, _token: &AccessToken, seed_ids: &[String]) -> Result<Vec<Track>> {
        self.record(format!("recommendations:{}", seed_ids.join(",")));
        if self.fail_pool {
            return Err(AppError::Spotify("timed out".to_string()));
        }
        Ok(self.recommendations.clone())
    }

    async fn fetch_audio_features(
        &self,
        _token: &AccessToken,
        track_ids: &[String],
    ) -> Result<HashMap<String, AudioFeatures>> {
        self.record(format!("features:{}", track_ids.len()));
        Ok(track_ids
            .iter()
            .filter_map(|id| self.features.get(id).map(|f| (id.clone(), *f)))
            .collect())
    }

    async fn fetch_artist_genres(
        &self,
        _token: &AccessToken,
        artist_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        self.record(format!("artists:{}", artist_ids.len()));
        Ok(self.genres.clone())
    }

    async fn fetch_cover_fallback(&self, _token: &AccessToken, lookup: CoverLookup<'_>) -> Result<Option<String>> {
        match lookup {
            CoverLookup::Track(id) => {
                self.record(format!("cover-track:{}", id));
                Ok(self.track_covers.get(id).cloned())
            }
            CoverLookup::Album(id) => {
                self.record(format!("cover-album:{}", id));
                Ok(self.album_covers.get(id).cloned())
            }
        }
    }
}
