pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod ml;
pub mod tracker;

pub use adapters::{BestdoriEndpoints, BestdoriHttp, ResponseCache, SingleFlightCache};
pub use config::AppConfig;
pub use domain::{EventCatalog, EventWindowProvider, Phase, RateTable, Region, Snapshot};
pub use error::{Result, TierwatchError};
pub use ml::{ForecastModel, TrendModel};
pub use tracker::{CutoffTrack, CutoffTracker, TrackKey};
