//! Tracker service: owns the collaborators and hands out enriched tracks.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, instrument};

use super::track::{CutoffTrack, EnrichContext, TrackKey};
use crate::adapters::{BestdoriEndpoints, ResponseCache};
use crate::domain::{EventCatalog, EventInfo, EventWindowProvider, RateTable, Region, TrackedTiers};
use crate::error::Result;
use crate::ml::ForecastModel;

pub struct CutoffTracker {
    events: Arc<dyn EventWindowProvider>,
    cache: Arc<dyn ResponseCache>,
    rates: Arc<RateTable>,
    model: Arc<dyn ForecastModel>,
    endpoints: BestdoriEndpoints,
    tiers: TrackedTiers,
}

impl CutoffTracker {
    pub fn new(
        events: Arc<dyn EventWindowProvider>,
        cache: Arc<dyn ResponseCache>,
        rates: Arc<RateTable>,
        model: Arc<dyn ForecastModel>,
        endpoints: BestdoriEndpoints,
        tiers: TrackedTiers,
    ) -> Self {
        Self {
            events,
            cache,
            rates,
            model,
            endpoints,
            tiers,
        }
    }

    /// Load the events listing and rate table through the cache, then build a
    /// tracker around them.
    #[instrument(skip_all)]
    pub async fn bootstrap(
        cache: Arc<dyn ResponseCache>,
        model: Arc<dyn ForecastModel>,
        endpoints: BestdoriEndpoints,
        tiers: TrackedTiers,
    ) -> Result<(Self, Arc<EventCatalog>)> {
        let events_raw = cache.fetch(&endpoints.events()).await?;
        let catalog = Arc::new(EventCatalog::from_json(&events_raw)?);

        let rates_raw = cache.fetch(&endpoints.rates()).await?;
        let rates = Arc::new(RateTable::from_json(&rates_raw)?);

        info!(
            "Tracker bootstrapped: {} events, {} rate rows",
            catalog.len(),
            rates.len()
        );

        let tracker = Self::new(catalog.clone(), cache, rates, model, endpoints, tiers);
        Ok((tracker, catalog))
    }

    pub fn tiers(&self) -> &TrackedTiers {
        &self.tiers
    }

    fn context(&self) -> EnrichContext<'_> {
        EnrichContext {
            cache: self.cache.as_ref(),
            endpoints: &self.endpoints,
            rates: self.rates.as_ref(),
            model: self.model.as_ref(),
        }
    }

    /// Cheap, synchronous resolution. No network.
    pub fn open(&self, event_id: i64, region: Region, tier: u32) -> CutoffTrack {
        CutoffTrack::open(
            self.events.as_ref(),
            &self.tiers,
            TrackKey::new(event_id, region, tier),
        )
    }

    pub async fn enrich(&self, track: CutoffTrack) -> CutoffTrack {
        track.enrich(&self.context()).await
    }

    /// Open and enrich in one step.
    pub async fn track(&self, event_id: i64, region: Region, tier: u32) -> CutoffTrack {
        self.enrich(self.open(event_id, region, tier)).await
    }

    /// Every tracked tier of `region` for one event, enriched concurrently.
    pub async fn track_tiers(&self, event_id: i64, region: Region) -> Vec<CutoffTrack> {
        let tiers = self.tiers.for_region(region).to_vec();
        join_all(
            tiers
                .into_iter()
                .map(|tier| self.track(event_id, region, tier)),
        )
        .await
    }

    /// Several tracks enriched concurrently, in input order. Meant for
    /// overlaying events with zero-baseline chart series.
    pub async fn compare(&self, keys: &[TrackKey]) -> Vec<CutoffTrack> {
        join_all(
            keys.iter()
                .map(|key| self.track(key.event_id, key.region, key.tier)),
        )
        .await
    }
}

/// Event a region is running now, or its most recently started one.
pub fn present_event(catalog: &EventCatalog, region: Region) -> Option<&EventInfo> {
    catalog.present_event(region, Utc::now().timestamp_millis())
}
