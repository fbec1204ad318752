use serde::{Deserialize, Serialize};

/// Track object as returned by the Spotify Web API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub available_markets: Vec<String>,
    /// Only present when the request carried a `market` parameter
    #[serde(default)]
    pub is_playable: Option<bool>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub album: Album,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Album {
    pub id: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub available_markets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    pub valence: f64,
    pub tempo: f64,
}

impl Track {
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// First album image with a usable http(s) URL
    pub fn embedded_cover(&self) -> Option<&str> {
        self.album
            .images
            .iter()
            .map(|img| img.url.as_str())
            .find(|url| url.starts_with("http"))
    }

    pub fn web_url(&self) -> String {
        match &self.external_urls.spotify {
            Some(url) if url.starts_with("https://") => url.clone(),
            _ => format!("https://open.spotify.com/track/{}", self.id),
        }
    }
}

/// One of the three tracks of the day, as sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPick {
    pub id: String,
    pub title: String,
    pub artists: String,
    pub album_cover_url: Option<String>,
    pub spotify_url: String,
    pub preview_url: Option<String>,
}

impl DailyPick {
    pub fn from_track(track: &Track, album_cover_url: Option<String>) -> Self {
        DailyPick {
            id: track.id.clone(),
            title: track.name.clone(),
            artists: track.artist_names(),
            album_cover_url,
            spotify_url: track.web_url(),
            preview_url: track
                .preview_url
                .clone()
                .filter(|url| url.starts_with("http")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Curated playlists with a popularity floor
    Playlist,
    /// Spotify recommendations seeded from configured tracks
    Seed,
    /// Static list served when the music source is unusable
    Fallback,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Playlist => "playlist",
            SelectionMode::Seed => "seed",
            SelectionMode::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickSource {
    Spotify,
    Fallback,
}

/// Per-rule rejection counts collected while filtering the raw pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCounts {
    pub total: usize,
    pub explicit: usize,
    pub popularity: usize,
    pub market: usize,
    pub region: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub mode: SelectionMode,
    pub seed: u64,
    pub seed_count: usize,
    pub candidates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default)]
    pub counts: FilterCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPicksResponse {
    pub date: String,
    pub mode: SelectionMode,
    pub source: PickSource,
    pub picks: Vec<DailyPick>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

#[cfg(test)]
impl Track {
    pub fn mock(id: &str, popularity: u32, release_date: &str) -> Self {
        Track {
            id: id.to_string(),
            name: format!("Song {}", id),
            artists: vec![Artist {
                id: Some(format!("artist-{}", id)),
                name: format!("Artist {}", id),
                genres: Vec::new(),
            }],
            explicit: false,
            popularity,
            available_markets: vec!["CZ".to_string()],
            is_playable: None,
            preview_url: None,
            external_urls: ExternalUrls {
                spotify: Some(format!("https://open.spotify.com/track/{}", id)),
            },
            album: Album {
                id: Some(format!("album-{}", id)),
                images: vec![Image {
                    url: format!("https://i.scdn.co/image/{}", id),
                    height: Some(640),
                    width: Some(640),
                }],
                release_date: Some(release_date.to_string()),
                available_markets: Vec::new(),
            },
        }
    }
}
