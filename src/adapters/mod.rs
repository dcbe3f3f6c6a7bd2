pub mod bestdori;
pub mod cache;

pub use bestdori::{BestdoriEndpoints, BestdoriHttp, DEFAULT_BESTDORI_URL};
pub use cache::{JsonFetcher, ResponseCache, SingleFlightCache};
