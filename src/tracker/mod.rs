pub mod forecast;
pub mod service;
pub mod track;

pub use service::{present_event, CutoffTracker};
pub use track::{chart_points, CutoffTrack, EnrichContext, EnrichedTrack, PendingTrack, TrackKey};
