//! Date-derived seed and the seeded shuffle built on it.
//!
//! Everyone requesting the same day must see the same picks, so all
//! randomness in the pipeline flows from the calendar date.

use chrono::{Datelike, NaiveDate};

/// How far back a requested `date` may reach (today included)
pub const MAX_DAYS_BACK: i64 = 6;

const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49297;
const LCG_MODULUS: u64 = 233280;

/// `YYYYMMDD` read as a base-10 number.
pub fn date_seed(date: NaiveDate) -> u64 {
    date.year() as u64 * 10_000 + date.month() as u64 * 100 + date.day() as u64
}

/// Resolve the `date` query parameter against today.
///
/// Anything that is not a strict `YYYY-MM-DD` date within the trailing
/// seven days is ignored in favour of `today`.
pub fn resolve_target_date(requested: Option<&str>, today: NaiveDate) -> NaiveDate {
    let Some(raw) = requested else {
        return today;
    };

    if !is_iso_date_shape(raw) {
        tracing::debug!("Ignoring malformed date parameter: {}", raw);
        return today;
    }

    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => {
            let days_back = (today - date).num_days();
            if (0..=MAX_DAYS_BACK).contains(&days_back) {
                date
            } else {
                tracing::debug!("Date {} is {} days back, using today", raw, days_back);
                today
            }
        }
        Err(_) => today,
    }
}

fn is_iso_date_shape(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Linear congruential generator driving the daily shuffle.
#[derive(Debug, Clone)]
pub struct DailyRng {
    state: u64,
}

impl DailyRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next index in `0..bound`
    fn next_index(&mut self, bound: usize) -> usize {
        self.state = (self.state % LCG_MODULUS * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
        (self.state * bound as u64 / LCG_MODULUS) as usize
    }
}

/// Deterministic Fisher-Yates shuffle. Same items and seed, same order.
pub fn seeded_shuffle<T: Clone>(items: &[T], seed: u64) -> Vec<T> {
    let mut shuffled = items.to_vec();
    let mut rng = DailyRng::new(seed);

    for i in (1..shuffled.len()).rev() {
        let j = rng.next_index(i + 1);
        shuffled.swap(i, j);
    }

    shuffled
}
