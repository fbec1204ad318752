//! Candidate filtering and the staged recency search.
//!
//! The raw pool is filtered once with the configured policy, then an ordered
//! list of tiers is tried until one yields enough candidates. Every tier
//! returns a superset of the previous tier's candidates.

use crate::models::{FilterCounts, Track};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

/// Recency windows in months, narrowest first
pub const RECENCY_WINDOWS: [u32; 4] = [3, 6, 12, 24];

/// A tier is good enough once it yields this many candidates
pub const MIN_CANDIDATES: usize = 3;

/// Popularity floor used by the relaxed tiers is never above this
pub const RELAXED_POPULARITY_CAP: u32 = 60;

/// Age assigned to tracks without a usable release date
pub const UNKNOWN_AGE_MONTHS: u32 = 999;

const DAYS_PER_MONTH: f64 = 30.44;

/// Artist substrings that mark a track as regional
const EXCLUDED_REGION_TERMS: [&str; 2] = ["czech", "slovak"];

/// Genre tag word that marks a track as regional on its own
const EXCLUDED_REGION_WORD: &str = "cz";

/// Artist id -> genre tags
pub type ArtistGenres = HashMap<String, Vec<String>>;

/// Whole months between a Spotify release date and `on`.
///
/// Year and year-month precision dates resolve to the first day of the period.
/// Releases after `on` count as brand new.
pub fn months_since_release(release_date: Option<&str>, on: NaiveDate) -> u32 {
    let Some(released) = release_date.and_then(parse_release_date) else {
        return UNKNOWN_AGE_MONTHS;
    };

    let days = (on - released).num_days().max(0);
    (days as f64 / DAYS_PER_MONTH).floor() as u32
}

fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    match raw.len() {
        10 => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok(),
        7 => NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d").ok(),
        4 => NaiveDate::parse_from_str(&format!("{}-01-01", raw), "%Y-%m-%d").ok(),
        _ => None,
    }
}

/// Keep the first occurrence of every track id.
pub fn dedupe_by_id(pool: Vec<Track>) -> Vec<Track> {
    let mut seen = HashSet::new();
    pool.into_iter()
        .filter(|track| seen.insert(track.id.clone()))
        .collect()
}

pub fn is_playable_in(track: &Track, market: &str) -> bool {
    track.is_playable == Some(true)
        || track.available_markets.iter().any(|m| m == market)
        || track.album.available_markets.iter().any(|m| m == market)
}

/// Whether any artist on the track is Czech or Slovak, judged by artist name
/// and by genre tags from the payload or the genre lookup.
pub fn is_excluded_region(track: &Track, genres: &ArtistGenres) -> bool {
    track.artists.iter().any(|artist| {
        let name = artist.name.to_lowercase();
        if EXCLUDED_REGION_TERMS.iter().any(|term| name.contains(term)) {
            return true;
        }

        let looked_up = artist
            .id
            .as_ref()
            .and_then(|id| genres.get(id))
            .into_iter()
            .flatten();

        artist.genres.iter().chain(looked_up).any(|genre| {
            let genre = genre.to_lowercase();
            EXCLUDED_REGION_TERMS.iter().any(|term| genre.contains(term))
                || genre
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|word| word == EXCLUDED_REGION_WORD)
        })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Explicit,
    Popularity,
    Market,
    Region,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    pub disallow_explicit: bool,
    pub require_market: bool,
    pub market: String,
    /// `None` skips the popularity rule (recommendation mode)
    pub popularity_floor: Option<u32>,
}

impl FilterPolicy {
    fn rejection(&self, track: &Track, genres: &ArtistGenres) -> Option<Rejection> {
        if self.disallow_explicit && track.explicit {
            return Some(Rejection::Explicit);
        }
        if let Some(floor) = self.popularity_floor {
            if track.popularity < floor {
                return Some(Rejection::Popularity);
            }
        }
        if self.require_market && !is_playable_in(track, &self.market) {
            return Some(Rejection::Market);
        }
        if is_excluded_region(track, genres) {
            return Some(Rejection::Region);
        }
        None
    }

    pub fn accepts(&self, track: &Track, genres: &ArtistGenres) -> bool {
        self.rejection(track, genres).is_none()
    }

    /// Filter the pool, counting why tracks were dropped.
    pub fn apply(&self, pool: &[Track], genres: &ArtistGenres) -> (Vec<Track>, FilterCounts) {
        let mut counts = FilterCounts {
            total: pool.len(),
            ..Default::default()
        };

        let kept: Vec<Track> = pool
            .iter()
            .filter(|track| match self.rejection(track, genres) {
                None => true,
                Some(Rejection::Explicit) => {
                    counts.explicit += 1;
                    false
                }
                Some(Rejection::Popularity) => {
                    counts.popularity += 1;
                    false
                }
                Some(Rejection::Market) => {
                    counts.market += 1;
                    false
                }
                Some(Rejection::Region) => {
                    counts.region += 1;
                    false
                }
            })
            .cloned()
            .collect();

        counts.kept = kept.len();
        (kept, counts)
    }

    fn with_relaxed_popularity(&self) -> Self {
        Self {
            popularity_floor: self
                .popularity_floor
                .map(|floor| floor.min(RELAXED_POPULARITY_CAP)),
            ..self.clone()
        }
    }

    fn without_market(&self) -> Self {
        Self {
            require_market: false,
            ..self.with_relaxed_popularity()
        }
    }
}

/// One stage of the widen-until-sufficient search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Filtered pool limited to releases at most this many months old
    Window(u32),
    /// Raw pool re-filtered with the popularity floor capped at 60
    RelaxedPopularity,
    /// Raw pool re-filtered without the market requirement
    IgnoreMarket,
}

impl Tier {
    pub fn name(&self) -> String {
        match self {
            Tier::Window(months) => format!("window-{}", months),
            Tier::RelaxedPopularity => "relaxed-popularity".to_string(),
            Tier::IgnoreMarket => "ignore-market".to_string(),
        }
    }

    pub fn window(&self) -> Option<u32> {
        match self {
            Tier::Window(months) => Some(*months),
            _ => None,
        }
    }
}

/// Tiers applicable to a policy, in the order they are tried.
pub fn tiers_for(policy: &FilterPolicy) -> Vec<Tier> {
    let mut tiers: Vec<Tier> = RECENCY_WINDOWS.iter().map(|&m| Tier::Window(m)).collect();
    if policy.popularity_floor.is_some() {
        tiers.push(Tier::RelaxedPopularity);
    }
    if policy.require_market {
        tiers.push(Tier::IgnoreMarket);
    }
    tiers
}

/// Inputs shared by every tier.
pub struct CandidatePool<'a> {
    pub raw: &'a [Track],
    pub filtered: &'a [Track],
    pub genres: &'a ArtistGenres,
    pub policy: &'a FilterPolicy,
    pub on: NaiveDate,
}

impl CandidatePool<'_> {
    fn within(&self, tracks: &[Track], months: u32) -> Vec<Track> {
        tracks
            .iter()
            .filter(|t| months_since_release(t.album.release_date.as_deref(), self.on) <= months)
            .cloned()
            .collect()
    }

    fn refiltered(&self, policy: &FilterPolicy) -> Vec<Track> {
        let widest = RECENCY_WINDOWS[RECENCY_WINDOWS.len() - 1];
        let kept: Vec<Track> = self
            .raw
            .iter()
            .filter(|t| policy.accepts(t, self.genres))
            .cloned()
            .collect();
        self.within(&kept, widest)
    }

    pub fn apply(&self, tier: Tier) -> Vec<Track> {
        match tier {
            Tier::Window(months) => self.within(self.filtered, months),
            Tier::RelaxedPopularity => self.refiltered(&self.policy.with_relaxed_popularity()),
            Tier::IgnoreMarket => self.refiltered(&self.policy.without_market()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TierOutcome {
    pub tier: Tier,
    pub candidates: Vec<Track>,
}

pub fn is_sufficient(candidates: &[Track]) -> bool {
    candidates.len() >= MIN_CANDIDATES
}

/// Try tiers in order, stopping at the first sufficient one. When none is
/// sufficient the last (widest) tier's candidates are returned.
pub fn widen_until_sufficient(pool: &CandidatePool<'_>, tiers: &[Tier]) -> TierOutcome {
    let mut outcome = TierOutcome {
        tier: Tier::Window(RECENCY_WINDOWS[0]),
        candidates: Vec::new(),
    };

    for &tier in tiers {
        let candidates = pool.apply(tier);
        tracing::debug!("Tier {} yielded {} candidates", tier.name(), candidates.len());

        let sufficient = is_sufficient(&candidates);
        outcome = TierOutcome { tier, candidates };
        if sufficient {
            break;
        }
    }

    outcome
}
