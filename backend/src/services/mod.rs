pub mod cache;
pub mod candidates;
pub mod covers;
pub mod daily_seed;
pub mod fallback;
pub mod music_source;
pub mod scoring;
pub mod selector;
pub mod spotify;

#[cfg(test)]
pub mod testing;

pub use cache::{MemoryCache, RedisCache, TtlCache};
pub use music_source::MusicSource;
pub use selector::{DailyTrackSelector, SelectionSettings};
pub use spotify::SpotifyClient;
