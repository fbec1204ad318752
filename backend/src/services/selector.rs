//! Daily Track Selector
//!
//! Produces the three "songs of the day" for a calendar date.
//!
//! Pipeline:
//! 1. Derive the date seed and authenticate against the music source
//! 2. Gather the raw pool (curated playlists or seeded recommendations)
//! 3. Filter, then widen the recency window until at least 3 candidates remain
//! 4. Score, keep the top 30, shuffle with the date seed and take 3
//! 5. Resolve cover art for the winners
//!
//! Any stage that fails degrades to an empty result; an unusable source ends
//! in the static fallback list. The selector never returns an error.

use crate::config::Config;
use crate::error::AppError;
use crate::models::{
    DailyPick, DailyPicksResponse, DebugInfo, FilterCounts, PickSource, SelectionMode, Track,
};
use crate::services::cache::TtlCache;
use crate::services::candidates::{
    dedupe_by_id, is_sufficient, tiers_for, widen_until_sufficient, ArtistGenres, CandidatePool,
    FilterPolicy, TierOutcome,
};
use crate::services::covers::resolve_cover;
use crate::services::daily_seed::{date_seed, seeded_shuffle};
use crate::services::fallback::fallback_picks;
use crate::services::music_source::{AccessToken, MusicSource};
use crate::services::scoring::{average_features, ScoreWeights, ScoredTrack, Scorer};
use chrono::NaiveDate;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PICKS_PER_DAY: usize = 3;

/// Recommendation requests use at most this many seed tracks
pub const MAX_DAILY_SEEDS: usize = 5;

#[derive(Debug, Clone)]
pub struct SelectionSettings {
    pub disallow_explicit: bool,
    pub require_market: bool,
    pub market: String,
    pub popularity_floor: u32,
    pub playlist_ids: Vec<String>,
    pub seed_tracks: Vec<String>,
}

impl From<&Config> for SelectionSettings {
    fn from(config: &Config) -> Self {
        Self {
            disallow_explicit: config.disallow_explicit,
            require_market: config.require_market,
            market: config.market.clone(),
            popularity_floor: config.popularity_floor,
            playlist_ids: config.playlist_ids.clone(),
            seed_tracks: config.seed_tracks.clone(),
        }
    }
}

/// Candidates gathered for one sourcing mode
struct PoolRun {
    mode: SelectionMode,
    outcome: TierOutcome,
    counts: FilterCounts,
    daily_seeds: Vec<String>,
}

pub struct DailyTrackSelector {
    source: Option<Arc<dyn MusicSource>>,
    cache: Arc<dyn TtlCache>,
    settings: SelectionSettings,
}

impl DailyTrackSelector {
    /// `source` is `None` when no credentials are configured.
    pub fn new(
        source: Option<Arc<dyn MusicSource>>,
        cache: Arc<dyn TtlCache>,
        settings: SelectionSettings,
    ) -> Self {
        Self {
            source,
            cache,
            settings,
        }
    }

    /// Sourcing mode for a request; seed mode needs configured seed tracks.
    pub fn resolve_mode(&self, requested: Option<SelectionMode>) -> SelectionMode {
        let has_seeds = !self.settings.seed_tracks.is_empty();
        match requested {
            Some(SelectionMode::Seed) if has_seeds => SelectionMode::Seed,
            Some(SelectionMode::Seed) => {
                debug!("Seed mode requested without seed tracks, using playlists");
                SelectionMode::Playlist
            }
            Some(_) => SelectionMode::Playlist,
            None if has_seeds => SelectionMode::Seed,
            None => SelectionMode::Playlist,
        }
    }

    fn policy_for(&self, mode: SelectionMode) -> FilterPolicy {
        FilterPolicy {
            disallow_explicit: self.settings.disallow_explicit,
            require_market: self.settings.require_market,
            market: self.settings.market.clone(),
            popularity_floor: match mode {
                SelectionMode::Seed => None,
                _ => Some(self.settings.popularity_floor),
            },
        }
    }

    /// Pick the tracks of the day. Always yields exactly three picks.
    pub async fn daily_picks(
        &self,
        date: NaiveDate,
        requested_mode: Option<SelectionMode>,
    ) -> DailyPicksResponse {
        let seed = date_seed(date);

        let Some(source) = self.source.as_deref() else {
            warn!("Spotify credentials not configured, serving fallback tracks");
            return self.fallback(date, seed, &AppError::MissingCredentials.to_string());
        };

        let token = match source.authenticate().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Music source authentication failed, serving fallback tracks: {}", e);
                return self.fallback(date, seed, &e.to_string());
            }
        };

        let mode = self.resolve_mode(requested_mode);
        let mut run = self.gather(source, &token, mode, date, seed).await;

        if run.mode == SelectionMode::Seed
            && !is_sufficient(&run.outcome.candidates)
            && !self.settings.playlist_ids.is_empty()
        {
            info!(
                "Seed mode yielded {} candidates, switching to playlists",
                run.outcome.candidates.len()
            );
            let playlist_run = self
                .gather(source, &token, SelectionMode::Playlist, date, seed)
                .await;
            if playlist_run.outcome.candidates.len() >= run.outcome.candidates.len() {
                run = playlist_run;
            }
        }

        if run.outcome.candidates.is_empty() {
            warn!("No usable candidates for {}, serving fallback tracks", date);
            return self.fallback(date, seed, "No usable candidates");
        }

        let ranked = self.rank(source, &token, &run, date).await;
        let winners = select_winners(&ranked, seed);
        let picks = self.build_picks(source, &token, &winners).await;

        info!(
            "Daily picks for {} ({}, {}): {:?}",
            date,
            run.mode.as_str(),
            run.outcome.tier.name(),
            picks
                .iter()
                .map(|p| format!("{} - {}", p.artists, p.title))
                .collect::<Vec<_>>()
        );

        DailyPicksResponse {
            date: date.format("%Y-%m-%d").to_string(),
            mode: run.mode,
            source: PickSource::Spotify,
            picks,
            debug: Some(DebugInfo {
                mode: run.mode,
                seed,
                seed_count: self.settings.seed_tracks.len(),
                candidates: run.outcome.candidates.len(),
                window: run.outcome.tier.window(),
                tier: Some(run.outcome.tier.name()),
                counts: run.counts,
                fallback_reason: None,
            }),
        }
    }

    async fn gather(
        &self,
        source: &dyn MusicSource,
        token: &AccessToken,
        mode: SelectionMode,
        date: NaiveDate,
        seed: u64,
    ) -> PoolRun {
        let (raw, daily_seeds) = match mode {
            SelectionMode::Seed => {
                let daily_seeds: Vec<String> = seeded_shuffle(&self.settings.seed_tracks, seed)
                    .into_iter()
                    .take(MAX_DAILY_SEEDS)
                    .collect();
                let raw = source
                    .fetch_recommendations(token, &daily_seeds)
                    .await
                    .unwrap_or_else(|e| {
                        warn!("Recommendations unavailable: {}", e);
                        Vec::new()
                    });
                (raw, daily_seeds)
            }
            _ => {
                let raw = source
                    .fetch_curated_pool(token, &self.settings.playlist_ids)
                    .await
                    .unwrap_or_else(|e| {
                        warn!("Curated playlists unavailable: {}", e);
                        Vec::new()
                    });
                (raw, Vec::new())
            }
        };

        let raw = dedupe_by_id(raw);
        let genres = self.artist_genres(source, token, &raw).await;

        let policy = self.policy_for(mode);
        let (filtered, counts) = policy.apply(&raw, &genres);
        debug!("{} mode: {:?}", mode.as_str(), counts);

        let pool = CandidatePool {
            raw: &raw,
            filtered: &filtered,
            genres: &genres,
            policy: &policy,
            on: date,
        };
        let outcome = widen_until_sufficient(&pool, &tiers_for(&policy));

        PoolRun {
            mode,
            outcome,
            counts,
            daily_seeds,
        }
    }

    async fn artist_genres(
        &self,
        source: &dyn MusicSource,
        token: &AccessToken,
        pool: &[Track],
    ) -> ArtistGenres {
        let mut seen = HashSet::new();
        let artist_ids: Vec<String> = pool
            .iter()
            .flat_map(|t| t.artists.iter().filter_map(|a| a.id.clone()))
            .filter(|id| seen.insert(id.clone()))
            .collect();

        if artist_ids.is_empty() {
            return ArtistGenres::new();
        }

        source
            .fetch_artist_genres(token, &artist_ids)
            .await
            .unwrap_or_else(|e| {
                warn!("Artist genres unavailable: {}", e);
                ArtistGenres::new()
            })
    }

    async fn rank(
        &self,
        source: &dyn MusicSource,
        token: &AccessToken,
        run: &PoolRun,
        date: NaiveDate,
    ) -> Vec<ScoredTrack> {
        let candidates = run.outcome.candidates.clone();

        if run.mode != SelectionMode::Seed {
            let no_features = HashMap::new();
            let scorer = Scorer {
                weights: ScoreWeights::CURATED,
                on: date,
                features: &no_features,
                seed_profile: None,
            };
            return scorer.rank(candidates);
        }

        let ids: Vec<String> = run
            .daily_seeds
            .iter()
            .cloned()
            .chain(candidates.iter().map(|t| t.id.clone()))
            .collect();
        let features = source
            .fetch_audio_features(token, &ids)
            .await
            .unwrap_or_else(|e| {
                warn!("Audio features unavailable: {}", e);
                HashMap::new()
            });
        let seed_profile = average_features(run.daily_seeds.iter().filter_map(|id| features.get(id)));

        let scorer = Scorer {
            weights: ScoreWeights::RECOMMENDATION,
            on: date,
            features: &features,
            seed_profile,
        };
        scorer.rank(candidates)
    }

    async fn build_picks(
        &self,
        source: &dyn MusicSource,
        token: &AccessToken,
        winners: &[Track],
    ) -> Vec<DailyPick> {
        let mut seen = HashSet::new();
        let unique: Vec<&Track> = winners.iter().filter(|t| seen.insert(t.id.as_str())).collect();

        let resolved = join_all(
            unique
                .iter()
                .map(|track| resolve_cover(source, self.cache.as_ref(), token, track)),
        )
        .await;

        let covers: HashMap<&str, Option<String>> = unique
            .iter()
            .map(|t| t.id.as_str())
            .zip(resolved)
            .collect();

        winners
            .iter()
            .map(|track| {
                let cover = covers.get(track.id.as_str()).cloned().flatten();
                DailyPick::from_track(track, cover)
            })
            .collect()
    }

    fn fallback(&self, date: NaiveDate, seed: u64, reason: &str) -> DailyPicksResponse {
        DailyPicksResponse {
            date: date.format("%Y-%m-%d").to_string(),
            mode: SelectionMode::Fallback,
            source: PickSource::Fallback,
            picks: fallback_picks(seed),
            debug: Some(DebugInfo {
                mode: SelectionMode::Fallback,
                seed,
                seed_count: self.settings.seed_tracks.len(),
                candidates: 0,
                window: None,
                tier: None,
                counts: FilterCounts::default(),
                fallback_reason: Some(reason.to_string()),
            }),
        }
    }
}

/// Shuffle the ranked list with the date seed and take three.
///
/// Short lists are topped up with the best remaining candidates, then by
/// repeating the best-scored one. An empty list yields no winners.
pub fn select_winners(ranked: &[ScoredTrack], seed: u64) -> Vec<Track> {
    let Some(best) = ranked.first() else {
        return Vec::new();
    };

    let mut winners: Vec<Track> = seeded_shuffle(ranked, seed)
        .into_iter()
        .take(PICKS_PER_DAY)
        .map(|scored| scored.track)
        .collect();

    for candidate in ranked {
        if winners.len() >= PICKS_PER_DAY {
            break;
        }
        if !winners.iter().any(|w| w.id == candidate.track.id) {
            winners.push(candidate.track.clone());
        }
    }

    while winners.len() < PICKS_PER_DAY {
        winners.push(best.track.clone());
    }

    winners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AudioFeatures;
    use crate::services::cache::MemoryCache;
    use crate::services::testing::ScriptedSource;
    use chrono::Duration;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn days_ago(days: i64) -> String {
        (day() - Duration::days(days)).format("%Y-%m-%d").to_string()
    }

    fn settings() -> SelectionSettings {
        SelectionSettings {
            disallow_explicit: true,
            require_market: true,
            market: "CZ".to_string(),
            popularity_floor: 70,
            playlist_ids: vec!["chart".to_string()],
            seed_tracks: Vec::new(),
        }
    }

    fn selector(source: ScriptedSource, settings: SelectionSettings) -> (DailyTrackSelector, Arc<ScriptedSource>) {
        let source = Arc::new(source);
        let selector = DailyTrackSelector::new(
            Some(source.clone() as Arc<dyn MusicSource>),
            Arc::new(MemoryCache::new()),
            settings,
        );
        (selector, source)
    }

    fn fresh_pool(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track::mock(&format!("t{:04}", i), 70 + (i % 30) as u32, &days_ago(20)))
            .collect()
    }

    fn scored(ids: &[&str]) -> Vec<ScoredTrack> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| ScoredTrack {
                track: Track::mock(id, 80, "2025-06-01"),
                score: 1.0 - i as f64 * 0.1,
            })
            .collect()
    }

    #[test]
    fn test_select_winners_pads_with_best() {
        let winners = select_winners(&scored(&["best"]), 20250615);
        assert_eq!(winners.len(), 3);
        assert!(winners.iter().all(|w| w.id == "best"));

        let winners = select_winners(&scored(&["a", "b"]), 20250615);
        let ids: Vec<_> = winners.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"a") && ids.contains(&"b"));
        assert_eq!(ids[2], "a");

        assert!(select_winners(&[], 20250615).is_empty());
    }

    #[test]
    fn test_select_winners_distinct_when_enough() {
        let winners = select_winners(&scored(&["a", "b", "c", "d", "e"]), 20250615);
        let unique: HashSet<_> = winners.iter().map(|w| w.id.clone()).collect();
        assert_eq!(unique.len(), 3);
    }

    #[tokio::test]
    async fn test_daily_picks_deterministic_for_date() {
        let source = ScriptedSource {
            curated: fresh_pool(25),
            ..Default::default()
        };
        let (selector, _) = selector(source, settings());

        let first = selector.daily_picks(day(), None).await;
        let second = selector.daily_picks(day(), None).await;
        assert_eq!(first.picks, second.picks);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_daily_picks_always_three() {
        for size in [0usize, 1, 2, 3, 1000] {
            let source = ScriptedSource {
                curated: fresh_pool(size),
                ..Default::default()
            };
            let (selector, _) = selector(source, settings());
            let response = selector.daily_picks(day(), None).await;
            assert_eq!(response.picks.len(), 3, "pool size {}", size);
        }
    }

    #[tokio::test]
    async fn test_no_explicit_picks() {
        let pool: Vec<Track> = fresh_pool(20)
            .into_iter()
            .enumerate()
            .map(|(i, mut t)| {
                t.explicit = i % 2 == 0;
                t
            })
            .collect();
        let explicit_ids: HashSet<String> = pool.iter().filter(|t| t.explicit).map(|t| t.id.clone()).collect();

        let source = ScriptedSource {
            curated: pool,
            ..Default::default()
        };
        let (selector, _) = selector(source, settings());
        let response = selector.daily_picks(day(), None).await;

        assert_eq!(response.source, PickSource::Spotify);
        assert!(response.picks.iter().all(|p| !explicit_ids.contains(&p.id)));
    }

    #[tokio::test]
    async fn test_looked_up_regional_genres_are_excluded() {
        let regional = ["t0000", "t0001", "t0002"];
        let genres = regional
            .iter()
            .map(|id| (format!("artist-{}", id), vec!["czech hip hop".to_string()]))
            .collect();
        let source = ScriptedSource {
            curated: fresh_pool(6),
            genres,
            ..Default::default()
        };
        let (selector, source) = selector(source, settings());
        let response = selector.daily_picks(day(), None).await;

        assert!(source.calls().contains(&"artists:6".to_string()));
        let debug = response.debug.unwrap();
        assert_eq!(debug.counts.region, 3);
        assert_eq!(debug.counts.kept, 3);
        assert!(response.picks.iter().all(|p| !regional.contains(&p.id.as_str())));
    }

    #[tokio::test]
    async fn test_three_month_window_used_when_sufficient() {
        let mut pool: Vec<Track> = (0..4)
            .map(|i| Track::mock(&format!("fresh{}", i), 80, &days_ago(30)))
            .collect();
        pool.push(Track::mock("classic", 95, &days_ago(609)));

        let source = ScriptedSource {
            curated: pool,
            ..Default::default()
        };
        let (selector, _) = selector(source, settings());
        let response = selector.daily_picks(day(), None).await;

        let debug = response.debug.unwrap();
        assert_eq!(debug.window, Some(3));
        assert_eq!(debug.candidates, 4);
        assert!(response.picks.iter().all(|p| p.id != "classic"));
    }

    #[tokio::test]
    async fn test_auth_failure_serves_fallback() {
        let source = ScriptedSource {
            fail_auth: true,
            curated: fresh_pool(10),
            ..Default::default()
        };
        let (selector, source) = selector(source, settings());
        let response = selector.daily_picks(day(), None).await;

        assert_eq!(response.mode, SelectionMode::Fallback);
        assert_eq!(response.source, PickSource::Fallback);
        assert_eq!(response.picks, fallback_picks(date_seed(day())));
        assert_eq!(source.calls(), vec!["authenticate".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_credentials_serves_fallback() {
        let selector = DailyTrackSelector::new(None, Arc::new(MemoryCache::new()), settings());
        let response = selector.daily_picks(day(), None).await;

        assert_eq!(response.picks.len(), 3);
        assert_eq!(response.source, PickSource::Fallback);
        assert!(response.debug.unwrap().fallback_reason.is_some());
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_to_fallback() {
        let source = ScriptedSource {
            fail_pool: true,
            ..Default::default()
        };
        let (selector, _) = selector(source, settings());
        let response = selector.daily_picks(day(), None).await;
        assert_eq!(response.source, PickSource::Fallback);
        assert_eq!(response.picks.len(), 3);
    }

    #[tokio::test]
    async fn test_single_candidate_is_repeated() {
        let mut stale = Track::mock("unpopular", 10, &days_ago(20));
        stale.available_markets.clear();
        let source = ScriptedSource {
            curated: vec![Track::mock("lonely", 90, &days_ago(20)), stale],
            ..Default::default()
        };
        let mut s = settings();
        s.require_market = false;
        let (selector, _) = selector(source, s);
        let response = selector.daily_picks(day(), None).await;

        assert_eq!(response.picks.len(), 3);
        assert!(response.picks.iter().all(|p| p == &response.picks[0]));
        assert_eq!(response.picks[0].id, "lonely");
    }

    #[tokio::test]
    async fn test_cover_resolved_from_album_lookup() {
        let mut track = Track::mock("bare", 90, &days_ago(20));
        track.album.images.clear();
        let source = ScriptedSource {
            curated: vec![track],
            album_covers: HashMap::from([(
                "album-bare".to_string(),
                "https://i.scdn.co/image/album-bare".to_string(),
            )]),
            ..Default::default()
        };
        let (selector, source) = selector(source, settings());
        let response = selector.daily_picks(day(), None).await;

        assert_eq!(
            response.picks[0].album_cover_url.as_deref(),
            Some("https://i.scdn.co/image/album-bare")
        );
        let calls = source.calls();
        assert!(calls.contains(&"cover-track:bare".to_string()));
        assert!(calls.contains(&"cover-album:album-bare".to_string()));
    }

    #[tokio::test]
    async fn test_cover_is_null_when_all_tiers_fail() {
        let mut track = Track::mock("nocover", 90, &days_ago(20));
        track.album.images.clear();
        let source = ScriptedSource {
            curated: vec![track],
            ..Default::default()
        };
        let (selector, _) = selector(source, settings());
        let response = selector.daily_picks(day(), None).await;

        assert!(response.picks.iter().all(|p| p.album_cover_url.is_none()));
    }

    #[tokio::test]
    async fn test_seed_mode_uses_recommendations_and_features() {
        let seeds: Vec<String> = (0..8).map(|i| format!("{:0>22}", i)).collect();
        let mut features = HashMap::new();
        for id in &seeds {
            features.insert(
                id.clone(),
                AudioFeatures {
                    danceability: 0.7,
                    energy: 0.6,
                    valence: 0.5,
                    tempo: 120.0,
                },
            );
        }
        let recommendations: Vec<Track> = (0..6)
            .map(|i| Track::mock(&format!("rec{}", i), 20, &days_ago(40)))
            .collect();

        let source = ScriptedSource {
            recommendations,
            features,
            ..Default::default()
        };
        let mut s = settings();
        s.seed_tracks = seeds.clone();
        let (selector, source) = selector(source, s);
        let response = selector.daily_picks(day(), None).await;

        assert_eq!(response.mode, SelectionMode::Seed);
        assert_eq!(response.picks.len(), 3);
        assert!(response.picks.iter().all(|p| p.id.starts_with("rec")));

        let calls = source.calls();
        let rec_call = calls.iter().find(|c| c.starts_with("recommendations:")).unwrap();
        let used: Vec<&str> = rec_call["recommendations:".len()..].split(',').collect();
        assert_eq!(used.len(), MAX_DAILY_SEEDS);
        assert!(used.iter().all(|id| seeds.iter().any(|s| s == id)));
        assert!(calls.iter().any(|c| c.starts_with("features:")));
    }

    #[tokio::test]
    async fn test_seed_mode_switches_to_playlists_when_thin() {
        let source = ScriptedSource {
            recommendations: vec![Track::mock("rec", 50, &days_ago(10))],
            curated: fresh_pool(5),
            ..Default::default()
        };
        let mut s = settings();
        s.seed_tracks = vec!["6usohdchdzW9oML7VC4Uhk".to_string()];
        let (selector, _) = selector(source, s);
        let response = selector.daily_picks(day(), None).await;

        assert_eq!(response.mode, SelectionMode::Playlist);
        assert!(response.picks.iter().all(|p| p.id.starts_with('t')));
    }

    #[test]
    fn test_resolve_mode() {
        let (plain, _) = selector(ScriptedSource::default(), settings());
        assert_eq!(plain.resolve_mode(None), SelectionMode::Playlist);
        assert_eq!(plain.resolve_mode(Some(SelectionMode::Seed)), SelectionMode::Playlist);

        let mut s = settings();
        s.seed_tracks = vec!["6usohdchdzW9oML7VC4Uhk".to_string()];
        let (seeded, _) = selector(ScriptedSource::default(), s);
        assert_eq!(seeded.resolve_mode(None), SelectionMode::Seed);
        assert_eq!(seeded.resolve_mode(Some(SelectionMode::Playlist)), SelectionMode::Playlist);
    }
}
