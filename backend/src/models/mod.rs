pub mod track;

pub use track::{
    AudioFeatures, DailyPick, DailyPicksResponse, DebugInfo, FilterCounts, Image, PickSource,
    SelectionMode, Track,
};
