use crate::error::{AppError, Result};
use crate::models::{AudioFeatures, Image, Track};
use crate::services::music_source::{AccessToken, CoverLookup, MusicSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

const PLAYLIST_PAGE_LIMIT: &str = "100";
const RECOMMENDATION_LIMIT: &str = "100";
const MAX_RECOMMENDATION_SEEDS: usize = 5;
const AUDIO_FEATURES_CHUNK: usize = 100;
const ARTISTS_CHUNK: usize = 50;

#[derive(Debug, Clone)]
pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    market: String,
    api_base: String,
    token_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistTracksPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    #[serde(default)]
    tracks: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AudioFeaturesResponse {
    #[serde(default)]
    audio_features: Vec<Option<SpotifyAudioFeatures>>,
}

#[derive(Debug, Deserialize)]
struct SpotifyAudioFeatures {
    id: String,
    #[serde(default)]
    danceability: f64,
    #[serde(default)]
    energy: f64,
    #[serde(default)]
    valence: f64,
    #[serde(default)]
    tempo: f64,
}

#[derive(Debug, Deserialize)]
struct ArtistsResponse {
    #[serde(default)]
    artists: Vec<Option<SpotifyArtist>>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    id: String,
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesHolder {
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct TrackAlbumHolder {
    #[serde(default)]
    album: Option<ImagesHolder>,
}

impl SpotifyClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        market: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client_id,
            client_secret,
            market,
            api_base: API_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.api_base, path);

        tracing::debug!("Spotify GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.as_str())
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::Spotify(format!("Request to {} failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Spotify(format!(
                "{} returned status: {} - {}",
                path,
                status,
                snippet(&body, 200)
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| AppError::Spotify(format!("Failed to read response: {}", e)))?;

        serde_json::from_str(&response_text).map_err(|e| {
            AppError::Spotify(format!(
                "Failed to parse {} response: {} - Response: {}",
                path,
                e,
                snippet(&response_text, 200)
            ))
        })
    }
}

fn snippet(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Parse track objects one by one, skipping local files and episodes that
/// do not fit the track shape.
fn parse_tracks(values: Vec<serde_json::Value>) -> Vec<Track> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Track>(value) {
            Ok(track) if !track.id.is_empty() => Some(track),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Skipping unparseable track object: {}", e);
                None
            }
        })
        .collect()
}

fn first_http_image(images: &[Image]) -> Option<String> {
    images
        .iter()
        .map(|img| img.url.as_str())
        .find(|url| url.starts_with("http"))
        .map(str::to_string)
}

#[async_trait]
impl MusicSource for SpotifyClient {
    async fn authenticate(&self) -> Result<AccessToken> {
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::AuthenticationFailed(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Spotify token endpoint error: {} - {}", status, snippet(&body, 200));
            return Err(AppError::AuthenticationFailed(format!("Token endpoint returned {}", status)));
        }

        let data: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::AuthenticationFailed(format!("Invalid token response: {}", e)))?;

        Ok(AccessToken(data.access_token))
    }

    async fn fetch_curated_pool(&self, token: &AccessToken, playlist_ids: &[String]) -> Result<Vec<Track>> {
        let mut tracks = Vec::new();

        for playlist_id in playlist_ids {
            let path = format!("/playlists/{}/tracks", playlist_id);
            match self
                .get_json::<PlaylistTracksPage>(token, &path, &[("limit", PLAYLIST_PAGE_LIMIT)])
                .await
            {
                Ok(page) => {
                    let parsed = parse_tracks(page.items.into_iter().filter_map(|item| item.track).collect());
                    tracing::debug!("Playlist {} yielded {} tracks", playlist_id, parsed.len());
                    tracks.extend(parsed);
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch playlist {}: {}", playlist_id, e);
                }
            }
        }

        Ok(tracks)
    }

    async fn fetch_recommendations(&self, token: &AccessToken, seed_ids: &[String]) -> Result<Vec<Track>> {
        if seed_ids.is_empty() {
            return Ok(Vec::new());
        }

        let seeds = seed_ids
            .iter()
            .take(MAX_RECOMMENDATION_SEEDS)
            .cloned()
            .collect::<Vec<_>>()
            .join(",");

        let data: RecommendationsResponse = self
            .get_json(
                token,
                "/recommendations",
                &[
                    ("seed_tracks", seeds.as_str()),
                    ("market", self.market.as_str()),
                    ("limit", RECOMMENDATION_LIMIT),
                    ("min_popularity", "0"),
                ],
            )
            .await?;

        Ok(parse_tracks(data.tracks))
    }

    async fn fetch_audio_features(
        &self,
        token: &AccessToken,
        track_ids: &[String],
    ) -> Result<HashMap<String, AudioFeatures>> {
        let mut features = HashMap::new();

        for chunk in track_ids.chunks(AUDIO_FEATURES_CHUNK) {
            let ids = chunk.join(",");
            let data: AudioFeaturesResponse = match self
                .get_json(token, "/audio-features", &[("ids", ids.as_str())])
                .await
            {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Skipping audio features batch of {}: {}", chunk.len(), e);
                    continue;
                }
            };

            for f in data.audio_features.into_iter().flatten() {
                features.insert(
                    f.id,
                    AudioFeatures {
                        danceability: f.danceability,
                        energy: f.energy,
                        valence: f.valence,
                        tempo: f.tempo,
                    },
                );
            }
        }

        Ok(features)
    }

    async fn fetch_artist_genres(
        &self,
        token: &AccessToken,
        artist_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        let mut genres = HashMap::new();

        for chunk in artist_ids.chunks(ARTISTS_CHUNK) {
            let ids = chunk.join(",");
            let data: ArtistsResponse = match self.get_json(token, "/artists", &[("ids", ids.as_str())]).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Skipping artist batch of {}: {}", chunk.len(), e);
                    continue;
                }
            };

            for artist in data.artists.into_iter().flatten() {
                genres.insert(artist.id, artist.genres);
            }
        }

        Ok(genres)
    }

    async fn fetch_cover_fallback(&self, token: &AccessToken, lookup: CoverLookup<'_>) -> Result<Option<String>> {
        match lookup {
            CoverLookup::Track(id) => {
                let data: TrackAlbumHolder = self.get_json(token, &format!("/tracks/{}", id), &[]).await?;
                Ok(data.album.and_then(|album| first_http_image(&album.images)))
            }
            CoverLookup::Album(id) => {
                let data: ImagesHolder = self.get_json(token, &format!("/albums/{}", id), &[]).await?;
                Ok(first_http_image(&data.images))
            }
        }
    }
}
