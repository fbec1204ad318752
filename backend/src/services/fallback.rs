use crate::models::DailyPick;
use crate::services::daily_seed::seeded_shuffle;

struct FallbackTrack {
    id: &'static str,
    title: &'static str,
    artists: &'static str,
    cover: &'static str,
}

/// Globally popular, non-explicit, non-regional tracks served when the
/// music source cannot produce a pick.
const FALLBACK_TRACKS: [FallbackTrack; 3] = [
    FallbackTrack {
        id: "6usohdchdzW9oML7VC4Uhk",
        title: "Lose Control",
        artists: "Teddy Swims",
        cover: "https://i.scdn.co/image/ab67616d0000b273e841e1c0b3a9f3c43e8a8d60",
    },
    FallbackTrack {
        id: "1BxfuPKGuaTgP7aM0Bbdwr",
        title: "Cruel Summer",
        artists: "Taylor Swift",
        cover: "https://i.scdn.co/image/ab67616d0000b273e787cffec20aa2a396a61647",
    },
    FallbackTrack {
        id: "0yLdNVWF3Srea0uzk55zFn",
        title: "Flowers",
        artists: "Miley Cyrus",
        cover: "https://i.scdn.co/image/ab67616d0000b273f58248221b6fafb93e1c44be",
    },
];

impl FallbackTrack {
    fn to_pick(&self) -> DailyPick {
        DailyPick {
            id: self.id.to_string(),
            title: self.title.to_string(),
            artists: self.artists.to_string(),
            album_cover_url: Some(self.cover.to_string()),
            spotify_url: format!("https://open.spotify.com/track/{}", self.id),
            preview_url: None,
        }
    }
}

/// The static list in the order of the day.
pub fn fallback_picks(seed: u64) -> Vec<DailyPick> {
    let picks: Vec<DailyPick> = FALLBACK_TRACKS.iter().map(FallbackTrack::to_pick).collect();
    seeded_shuffle(&picks, seed)
}
