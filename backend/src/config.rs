use std::collections::HashSet;
use std::env;

/// Global chart playlists used when `SPOTIFY_PLAYLIST_IDS` is not set.
const DEFAULT_PLAYLIST_IDS: &str =
    "37i9dQZF1DXcBWIGoYBM5M,37i9dQZEVXbMDoHDwVN2tF,37i9dQZF1DWUa8ZRTfalHk,37i9dQZF1DX4JAvHpjipBk";

const MAX_SEED_TRACKS: usize = 100;
const SPOTIFY_ID_LEN: usize = 22;

#[derive(Debug, Clone)]
pub struct Config {
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub disallow_explicit: bool,
    /// Reject tracks not playable in `market`
    pub require_market: bool,
    pub market: String,
    /// Minimum popularity for curated playlist candidates
    pub popularity_floor: u32,
    pub playlist_ids: Vec<String>,
    /// Seed track IDs for recommendation mode, parsed from `SEED_TRACKS`
    pub seed_tracks: Vec<String>,
    pub debug_no_cache: bool,
    pub redis_url: Option<String>,
    pub response_cache_ttl_secs: u64,
    pub http_timeout_secs: u64,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("SERVER_PORT must be a valid port number: {}", e))?;

        Ok(Config {
            spotify_client_id: non_empty_var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: non_empty_var("SPOTIFY_CLIENT_SECRET"),
            disallow_explicit: flag_var("DISALLOW_EXPLICIT", true),
            require_market: flag_var("REQUIRE_CZ", true),
            market: env::var("MARKET").unwrap_or_else(|_| "CZ".to_string()),
            popularity_floor: env::var("POP_MIN")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(70),
            playlist_ids: parse_list(
                &env::var("SPOTIFY_PLAYLIST_IDS").unwrap_or_else(|_| DEFAULT_PLAYLIST_IDS.to_string()),
            ),
            seed_tracks: parse_seed_tracks(&env::var("SEED_TRACKS").unwrap_or_default()),
            debug_no_cache: flag_var("DEBUG_NO_CACHE", false),
            redis_url: non_empty_var("REDIS_URL"),
            response_cache_ttl_secs: env::var("RESPONSE_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag_var(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse seed tracks given as bare Spotify IDs or `open.spotify.com/track/<id>` URLs,
/// separated by commas or whitespace. Duplicates are dropped, order is kept.
pub fn parse_seed_tracks(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(extract_track_id)
        .filter(|id| seen.insert(id.clone()))
        .take(MAX_SEED_TRACKS)
        .collect()
}

fn extract_track_id(token: &str) -> Option<String> {
    let token = token.trim();
    let candidate = match token.find("track/") {
        Some(pos) => {
            let rest = &token[pos + "track/".len()..];
            let end = rest
                .find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(rest.len());
            &rest[..end]
        }
        None => token,
    };

    let valid = candidate.len() == SPOTIFY_ID_LEN && candidate.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| candidate.to_string())
}
