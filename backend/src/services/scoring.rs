use crate::models::{AudioFeatures, Track};
use crate::services::candidates::months_since_release;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Only this many best-scored candidates go into the daily shuffle
pub const TOP_CANDIDATES: usize = 30;

/// Recency boost decays linearly to zero over this many months
pub const RECENCY_HORIZON_MONTHS: f64 = 18.0;

const TEMPO_SCALE: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub similarity: f64,
    pub popularity: f64,
    pub recency: f64,
}

impl ScoreWeights {
    /// Curated playlists. The remaining 0.15 is unassigned.
    pub const CURATED: ScoreWeights = ScoreWeights {
        similarity: 0.0,
        popularity: 0.60,
        recency: 0.25,
    };

    pub const RECOMMENDATION: ScoreWeights = ScoreWeights {
        similarity: 0.70,
        popularity: 0.05,
        recency: 0.25,
    };
}

#[derive(Debug, Clone)]
pub struct ScoredTrack {
    pub track: Track,
    pub score: f64,
}

pub fn normalized_popularity(popularity: u32) -> f64 {
    (popularity as f64 / 100.0).clamp(0.0, 1.0)
}

pub fn recency_boost(release_date: Option<&str>, on: NaiveDate) -> f64 {
    let months = months_since_release(release_date, on) as f64;
    (1.0 - months / RECENCY_HORIZON_MONTHS).max(0.0)
}

fn feature_vector(f: &AudioFeatures) -> [f64; 4] {
    [f.danceability, f.energy, f.valence, f.tempo / TEMPO_SCALE]
}

pub fn cosine_similarity(a: &AudioFeatures, b: &AudioFeatures) -> f64 {
    let (va, vb) = (feature_vector(a), feature_vector(b));
    let dot: f64 = va.iter().zip(vb.iter()).map(|(x, y)| x * y).sum();
    let mag_a = va.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b = vb.iter().map(|x| x * x).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Mean of the seed tracks' features, `None` when there are none.
pub fn average_features<'a, I>(features: I) -> Option<AudioFeatures>
where
    I: IntoIterator<Item = &'a AudioFeatures>,
{
    let mut sum = AudioFeatures {
        danceability: 0.0,
        energy: 0.0,
        valence: 0.0,
        tempo: 0.0,
    };
    let mut count = 0usize;

    for f in features {
        sum.danceability += f.danceability;
        sum.energy += f.energy;
        sum.valence += f.valence;
        sum.tempo += f.tempo;
        count += 1;
    }

    if count == 0 {
        return None;
    }

    let n = count as f64;
    Some(AudioFeatures {
        danceability: sum.danceability / n,
        energy: sum.energy / n,
        valence: sum.valence / n,
        tempo: sum.tempo / n,
    })
}

/// Audio similarity used by recommendation mode.
///
/// Against the seed profile when one exists, otherwise the plain mean of
/// danceability, energy and valence. Tracks without features score 0.
pub fn similarity(candidate: Option<&AudioFeatures>, seed_profile: Option<&AudioFeatures>) -> f64 {
    match (candidate, seed_profile) {
        (None, _) => 0.0,
        (Some(c), Some(profile)) => cosine_similarity(c, profile),
        (Some(c), None) => (c.danceability + c.energy + c.valence) / 3.0,
    }
}

pub struct Scorer<'a> {
    pub weights: ScoreWeights,
    pub on: NaiveDate,
    pub features: &'a HashMap<String, AudioFeatures>,
    pub seed_profile: Option<AudioFeatures>,
}

impl Scorer<'_> {
    pub fn score(&self, track: &Track) -> f64 {
        let mut score = self.weights.popularity * normalized_popularity(track.popularity)
            + self.weights.recency * recency_boost(track.album.release_date.as_deref(), self.on);

        if self.weights.similarity > 0.0 {
            score += self.weights.similarity
                * similarity(self.features.get(&track.id), self.seed_profile.as_ref());
        }

        score
    }

    /// Score, sort descending (ties by id) and keep the top candidates.
    pub fn rank(&self, candidates: Vec<Track>) -> Vec<ScoredTrack> {
        let mut scored: Vec<ScoredTrack> = candidates
            .into_iter()
            .map(|track| ScoredTrack {
                score: self.score(&track),
                track,
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.track.id.cmp(&b.track.id))
        });
        scored.truncate(TOP_CANDIDATES);
        scored
    }
}
