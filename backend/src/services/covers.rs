use crate::models::Track;
use crate::services::cache::TtlCache;
use crate::services::music_source::{AccessToken, CoverLookup, MusicSource};
use std::time::Duration;

pub const COVER_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn cache_key(track_id: &str) -> String {
    format!("cover:{}", track_id)
}

/// Resolve an album cover for a winning track.
///
/// Order: embedded album image, cache, lookup by track id, lookup by album id.
/// Returns `None` when every tier comes up empty; nothing is cached then.
pub async fn resolve_cover(
    source: &dyn MusicSource,
    cache: &dyn TtlCache,
    token: &AccessToken,
    track: &Track,
) -> Option<String> {
    if let Some(url) = track.embedded_cover() {
        return Some(url.to_string());
    }

    let key = cache_key(&track.id);
    match cache.get(&key).await {
        Ok(Some(url)) => return Some(url),
        Ok(None) => {}
        Err(e) => tracing::warn!("Cover cache read failed for {}: {}", track.id, e),
    }

    let mut lookups = vec![CoverLookup::Track(&track.id)];
    if let Some(album_id) = track.album.id.as_deref() {
        lookups.push(CoverLookup::Album(album_id));
    }

    for lookup in lookups {
        match source.fetch_cover_fallback(token, lookup).await {
            Ok(Some(url)) if url.starts_with("http") => {
                if let Err(e) = cache.set(&key, &url, COVER_CACHE_TTL).await {
                    tracing::warn!("Cover cache write failed for {}: {}", track.id, e);
                }
                return Some(url);
            }
            Ok(_) => tracing::debug!("No cover via {:?}", lookup),
            Err(e) => tracing::warn!("Cover lookup {:?} failed: {}", lookup, e),
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryCache;
    use crate::services::testing::ScriptedSource;

    fn bare_track(id: &str) -> Track {
        let mut track = Track::mock(id, 80, "2025-01-01");
        track.album.images.clear();
        track
    }

    fn token() -> AccessToken {
        AccessToken("test-token".to_string())
    }

    #[tokio::test]
    async fn test_embedded_cover_skips_lookups() {
        let source = ScriptedSource::default();
        let cache = MemoryCache::new();
        let track = Track::mock("t1", 80, "2025-01-01");

        let cover = resolve_cover(&source, &cache, &token(), &track).await;

        assert_eq!(cover.as_deref(), Some("https://i.scdn.co/image/t1"));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_track_lookup_result_is_cached() {
        let mut source = ScriptedSource::default();
        source
            .track_covers
            .insert("bare".to_string(), "https://covers.test/bare.jpg".to_string());
        let cache = MemoryCache::new();
        let track = bare_track("bare");

        let cover = resolve_cover(&source, &cache, &token(), &track).await;
        assert_eq!(cover.as_deref(), Some("https://covers.test/bare.jpg"));
        assert_eq!(
            cache.get("cover:bare").await.unwrap().as_deref(),
            Some("https://covers.test/bare.jpg")
        );

        // Second resolution is served from the cache
        let again = resolve_cover(&source, &cache, &token(), &track).await;
        assert_eq!(again, cover);
        assert_eq!(source.calls(), vec!["cover-track:bare".to_string()]);
    }

    #[tokio::test]
    async fn test_album_lookup_after_track_miss() {
        let mut source = ScriptedSource::default();
        source
            .album_covers
            .insert("album-bare".to_string(), "https://covers.test/album.jpg".to_string());
        let cache = MemoryCache::new();

        let cover = resolve_cover(&source, &cache, &token(), &bare_track("bare")).await;

        assert_eq!(cover.as_deref(), Some("https://covers.test/album.jpg"));
        assert_eq!(
            source.calls(),
            vec!["cover-track:bare".to_string(), "cover-album:album-bare".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_cover_anywhere() {
        let source = ScriptedSource::default();
        let cache = MemoryCache::new();

        let cover = resolve_cover(&source, &cache, &token(), &bare_track("bare")).await;

        assert_eq!(cover, None);
        assert_eq!(cache.get("cover:bare").await.unwrap(), None);
    }
}
