//! Bestdori HTTP adapter: endpoint URLs and the reqwest-backed fetcher.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::cache::JsonFetcher;
use crate::domain::Region;
use crate::error::{Result, TierwatchError};

pub const DEFAULT_BESTDORI_URL: &str = "https://bestdori.com";

const EVENTS_PATH: &str = "/api/events/all.6.json";
const RATES_PATH: &str = "/api/tracker/rates.json";
const TRACKER_DATA_PATH: &str = "/api/tracker/data";

/// Builds upstream endpoint URLs from a base URL
#[derive(Debug, Clone)]
pub struct BestdoriEndpoints {
    base_url: String,
}

impl BestdoriEndpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn events(&self) -> String {
        format!("{}{}", self.base_url, EVENTS_PATH)
    }

    pub fn rates(&self) -> String {
        format!("{}{}", self.base_url, RATES_PATH)
    }

    /// Cutoff series for one (region, event, tier). Doubles as the cache key.
    pub fn tracker_data(&self, region: Region, event_id: i64, tier: u32) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}{}", self.base_url, TRACKER_DATA_PATH),
            &[
                ("server", region.id().to_string()),
                ("event", event_id.to_string()),
                ("tier", tier.to_string()),
            ],
        )?;
        Ok(url.to_string())
    }
}

impl Default for BestdoriEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BESTDORI_URL)
    }
}

#[derive(Clone)]
pub struct BestdoriHttp {
    http: Client,
}

impl BestdoriHttp {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                TierwatchError::Internal(format!("failed to build Bestdori HTTP client: {}", e))
            })?;

        Ok(Self { http })
    }
}

#[async_trait]
impl JsonFetcher for BestdoriHttp {
    #[instrument(skip(self))]
    async fn fetch_json(&self, url: &str) -> Result<Value> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TierwatchError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let value: Value = response.json().await?;
        debug!("Fetched {}", url);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_data_url() {
        let endpoints = BestdoriEndpoints::new("https://bestdori.com/");
        assert_eq!(
            endpoints.tracker_data(Region::Cn, 215, 1000).unwrap(),
            "https://bestdori.com/api/tracker/data?server=3&event=215&tier=1000"
        );
    }

    #[test]
    fn test_listing_urls() {
        let endpoints = BestdoriEndpoints::default();
        assert_eq!(endpoints.events(), "https://bestdori.com/api/events/all.6.json");
        assert_eq!(endpoints.rates(), "https://bestdori.com/api/tracker/rates.json");
    }

    #[test]
    fn test_bad_base_url_is_an_error() {
        let endpoints = BestdoriEndpoints::new("not a url");
        assert!(endpoints.tracker_data(Region::Jp, 1, 100).is_err());
    }
}
