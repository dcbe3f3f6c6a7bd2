//! Cutoff track: one (event, region, tier) and everything known about it.
//!
//! A track moves through three states:
//! - `NotFound`: unknown event, untracked tier, or the upstream had no data.
//! - `Pending`: resolved from the event catalog, no network data yet.
//! - `Enriched`: snapshot series, rate and forecast populated.
//!
//! Opening is synchronous and does no I/O. Enrichment consumes the track and
//! returns the next state; enriching a `NotFound` or `Enriched` track returns
//! it unchanged without touching the network.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::forecast::predict_final_ep;
use crate::adapters::{BestdoriEndpoints, ResponseCache};
use crate::domain::{
    ChartPoint, CutoffPayload, EventWindow, EventWindowProvider, Phase, RateTable, Region,
    Snapshot, TrackedTiers,
};
use crate::ml::ForecastModel;

/// Identity of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackKey {
    pub event_id: i64,
    pub region: Region,
    pub tier: u32,
}

impl TrackKey {
    pub fn new(event_id: i64, region: Region, tier: u32) -> Self {
        Self {
            event_id,
            region,
            tier,
        }
    }
}

impl std::fmt::Display for TrackKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/event {}/t{}", self.region, self.event_id, self.tier)
    }
}

/// Collaborators enrichment reads through
#[derive(Clone, Copy)]
pub struct EnrichContext<'a> {
    pub cache: &'a dyn ResponseCache,
    pub endpoints: &'a BestdoriEndpoints,
    pub rates: &'a RateTable,
    pub model: &'a dyn ForecastModel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingTrack {
    #[serde(flatten)]
    pub key: TrackKey,
    pub event_type: String,
    pub window: EventWindow,
    /// Fixed at open time.
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedTrack {
    #[serde(flatten)]
    pub base: PendingTrack,
    pub snapshots: Vec<Snapshot>,
    /// Last snapshot, or zero points at the window start for an empty series.
    pub latest: Snapshot,
    pub rate: Option<f64>,
    /// Only forecast while the event is in progress; 0 otherwise.
    pub predicted_ep: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CutoffTrack {
    NotFound(TrackKey),
    Pending(PendingTrack),
    Enriched(EnrichedTrack),
}

impl CutoffTrack {
    /// Resolve a track against the event catalog using the current time.
    pub fn open(provider: &dyn EventWindowProvider, tiers: &TrackedTiers, key: TrackKey) -> Self {
        Self::open_at(provider, tiers, key, Utc::now().timestamp_millis())
    }

    pub fn open_at(
        provider: &dyn EventWindowProvider,
        tiers: &TrackedTiers,
        key: TrackKey,
        now_ms: i64,
    ) -> Self {
        let Some(event) = provider.lookup(key.event_id) else {
            debug!("Track {}: unknown event", key);
            return CutoffTrack::NotFound(key);
        };
        if !tiers.contains(key.region, key.tier) {
            debug!("Track {}: tier not tracked in region", key);
            return CutoffTrack::NotFound(key);
        }
        let Some(window) = event.window(key.region) else {
            debug!("Track {}: event has no window in region", key);
            return CutoffTrack::NotFound(key);
        };

        CutoffTrack::Pending(PendingTrack {
            key,
            event_type: event.event_type,
            window,
            phase: window.phase_at(now_ms),
        })
    }

    /// Populate network-derived fields. Only `Pending` tracks do any work.
    pub async fn enrich(self, ctx: &EnrichContext<'_>) -> Self {
        match self {
            CutoffTrack::Pending(pending) => pending.enrich(ctx).await,
            other => other,
        }
    }

    pub fn key(&self) -> TrackKey {
        match self {
            CutoffTrack::NotFound(key) => *key,
            CutoffTrack::Pending(p) => p.key,
            CutoffTrack::Enriched(e) => e.base.key,
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, CutoffTrack::NotFound(_))
    }

    pub fn is_enriched(&self) -> bool {
        matches!(self, CutoffTrack::Enriched(_))
    }

    fn base(&self) -> Option<&PendingTrack> {
        match self {
            CutoffTrack::NotFound(_) => None,
            CutoffTrack::Pending(p) => Some(p),
            CutoffTrack::Enriched(e) => Some(&e.base),
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        self.base().map(|b| b.phase)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.base().map(|b| b.event_type.as_str())
    }

    pub fn window(&self) -> Option<EventWindow> {
        self.base().map(|b| b.window)
    }

    pub fn as_enriched(&self) -> Option<&EnrichedTrack> {
        match self {
            CutoffTrack::Enriched(e) => Some(e),
            _ => None,
        }
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        self.as_enriched().map(|e| e.snapshots.as_slice()).unwrap_or(&[])
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.as_enriched().map(|e| e.latest)
    }

    pub fn rate(&self) -> Option<f64> {
        self.as_enriched().and_then(|e| e.rate)
    }

    pub fn predicted_ep(&self) -> u64 {
        self.as_enriched().map(|e| e.predicted_ep).unwrap_or(0)
    }

    /// Plot-ready series; see [`chart_points`]. Empty for `NotFound`.
    pub fn chart_series(&self, zero_baseline: bool) -> Vec<ChartPoint> {
        match self.window() {
            Some(window) => chart_points(window, self.snapshots(), zero_baseline),
            None => Vec::new(),
        }
    }
}

impl PendingTrack {
    pub async fn enrich(self, ctx: &EnrichContext<'_>) -> CutoffTrack {
        let key = self.key;
        let url = match ctx.endpoints.tracker_data(key.region, key.event_id, key.tier) {
            Ok(url) => url,
            Err(e) => {
                warn!("Track {}: cannot build tracker URL: {}", key, e);
                return CutoffTrack::NotFound(key);
            }
        };

        let raw = match ctx.cache.fetch(&url).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Track {}: cutoff fetch failed: {}", key, e);
                return CutoffTrack::NotFound(key);
            }
        };

        let payload = match CutoffPayload::deserialize(&*raw) {
            Ok(payload) if payload.result => payload,
            Ok(_) => {
                debug!("Track {}: upstream reports no data", key);
                return CutoffTrack::NotFound(key);
            }
            Err(e) => {
                warn!("Track {}: malformed cutoff payload: {}", key, e);
                return CutoffTrack::NotFound(key);
            }
        };

        let snapshots = payload.cutoffs;
        let Some(latest) = snapshots.last().copied() else {
            debug!("Track {}: empty cutoff series", key);
            return CutoffTrack::Enriched(EnrichedTrack {
                latest: Snapshot::new(self.window.start_at, 0),
                base: self,
                snapshots,
                rate: None,
                predicted_ep: 0,
            });
        };

        let rate = ctx.rates.lookup(key.region, &self.event_type, key.tier);
        let predicted_ep = if self.phase == Phase::InProgress {
            predict_final_ep(ctx.model, &snapshots, self.window, rate)
        } else {
            0
        };

        debug!(
            "Track {}: {} snapshots, latest ep {}, rate {:?}, predicted {}",
            key,
            snapshots.len(),
            latest.ep,
            rate,
            predicted_ep
        );

        CutoffTrack::Enriched(EnrichedTrack {
            base: self,
            snapshots,
            latest,
            rate,
            predicted_ep,
        })
    }
}

/// Chart series for a window and its snapshots.
///
/// Absolute mode starts at `(start_at, 0)` and plots samples verbatim.
/// Zero-baseline mode starts at `(0, 0)` and rebases time to the window start
/// and score to the first sample, so different events overlay.
pub fn chart_points(
    window: EventWindow,
    snapshots: &[Snapshot],
    zero_baseline: bool,
) -> Vec<ChartPoint> {
    let mut points = Vec::with_capacity(snapshots.len() + 1);
    if zero_baseline {
        points.push(ChartPoint::new(0, 0));
        let first_ep = snapshots.first().map(|s| s.ep as i64).unwrap_or(0);
        points.extend(
            snapshots
                .iter()
                .map(|s| ChartPoint::new(s.time - window.start_at, s.ep as i64 - first_ep)),
        );
    } else {
        points.push(ChartPoint::new(window.start_at, 0));
        points.extend(snapshots.iter().map(|s| ChartPoint::new(s.time, s.ep as i64)));
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventCatalog, EventInfo, RateRow};
    use crate::error::{Result, TierwatchError};
    use crate::ml::cutoff_model::MockForecastModel;
    use crate::ml::Forecast;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const START: i64 = 1_000;
    const END: i64 = 1_000_000;

    struct StubCache {
        payload: Option<Value>,
        calls: AtomicUsize,
    }

    impl StubCache {
        fn returning(payload: Value) -> Self {
            Self {
                payload: Some(payload),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                payload: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ResponseCache for StubCache {
        async fn fetch(&self, _url: &str) -> Result<Arc<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payload
                .clone()
                .map(Arc::new)
                .ok_or_else(|| TierwatchError::Internal("connection reset".to_string()))
        }
    }

    fn catalog() -> EventCatalog {
        let mut start_at = [None; 5];
        let mut end_at = [None; 5];
        start_at[Region::Cn.index()] = Some(START);
        end_at[Region::Cn.index()] = Some(END);
        EventCatalog::new(vec![EventInfo {
            event_id: 7,
            event_type: "story".to_string(),
            names: vec![],
            start_at,
            end_at,
        }])
    }

    fn rates() -> RateTable {
        RateTable::new(vec![
            RateRow {
                region: Region::Cn,
                event_type: "story".to_string(),
                tier: 100,
                rate: 0.2,
            },
            RateRow {
                region: Region::Cn,
                event_type: "story".to_string(),
                tier: 1000,
                rate: 0.6,
            },
        ])
    }

    fn open(tier: u32, now_ms: i64) -> CutoffTrack {
        CutoffTrack::open_at(
            &catalog(),
            &TrackedTiers::default(),
            TrackKey::new(7, Region::Cn, tier),
            now_ms,
        )
    }

    fn series_payload() -> Value {
        json!({
            "result": true,
            "cutoffs": [{ "time": 1000, "ep": 5 }, { "time": 3000, "ep": 12 }]
        })
    }

    fn no_call_model() -> MockForecastModel {
        let mut model = MockForecastModel::new();
        model.expect_predict().times(0);
        model
    }

    #[test]
    fn test_unknown_event_is_not_found() {
        let track = CutoffTrack::open_at(
            &catalog(),
            &TrackedTiers::default(),
            TrackKey::new(999, Region::Cn, 100),
            START,
        );
        assert!(!track.exists());
        assert_eq!(track.phase(), None);
        assert_eq!(track.event_type(), None);
        assert!(track.snapshots().is_empty());
        assert_eq!(track.predicted_ep(), 0);
        assert!(track.chart_series(true).is_empty());
    }

    #[test]
    fn test_untracked_tier_is_not_found() {
        assert!(!open(123, START).exists());
        // tracked in cn but not in tw
        let track = CutoffTrack::open_at(
            &catalog(),
            &TrackedTiers::default(),
            TrackKey::new(7, Region::Tw, 1000),
            START,
        );
        assert!(!track.exists());
    }

    #[test]
    fn test_region_without_window_is_not_found() {
        let track = CutoffTrack::open_at(
            &catalog(),
            &TrackedTiers::default(),
            TrackKey::new(7, Region::Jp, 100),
            START,
        );
        assert!(!track.exists());
    }

    #[test]
    fn test_phase_from_clock() {
        assert_eq!(open(100, START - 1).phase(), Some(Phase::NotStarted));
        assert_eq!(open(100, START + 1).phase(), Some(Phase::InProgress));
        assert_eq!(open(100, END + 1).phase(), Some(Phase::Ended));

        let track = open(100, START + 1);
        assert!(track.exists());
        assert!(!track.is_enriched());
        assert_eq!(track.event_type(), Some("story"));
        assert_eq!(track.window(), Some(EventWindow::new(START, END)));
    }

    #[tokio::test]
    async fn test_enrich_is_idempotent() {
        let cache = StubCache::returning(series_payload());
        let model = no_call_model();
        let endpoints = BestdoriEndpoints::default();
        let rates = rates();
        let ctx = EnrichContext {
            cache: &cache,
            endpoints: &endpoints,
            rates: &rates,
            model: &model,
        };

        let once = open(100, END + 1).enrich(&ctx).await;
        let twice = once.clone().enrich(&ctx).await;

        assert_eq!(cache.calls(), 1);
        assert_eq!(once, twice);
        assert!(twice.is_enriched());
        assert_eq!(twice.latest(), Some(Snapshot::new(3000, 12)));
        assert_eq!(twice.rate(), Some(0.2));
        // ended: no forecast
        assert_eq!(twice.predicted_ep(), 0);
    }

    #[tokio::test]
    async fn test_enrich_not_found_skips_fetch() {
        let cache = StubCache::returning(series_payload());
        let model = no_call_model();
        let endpoints = BestdoriEndpoints::default();
        let rates = rates();
        let ctx = EnrichContext {
            cache: &cache,
            endpoints: &endpoints,
            rates: &rates,
            model: &model,
        };

        let track = open(123, START).enrich(&ctx).await;
        assert!(!track.exists());
        assert_eq!(cache.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_or_negative_result_degrades_to_not_found() {
        let model = no_call_model();
        let endpoints = BestdoriEndpoints::default();
        let rates = rates();

        for cache in [
            StubCache::failing(),
            StubCache::returning(json!({ "result": false })),
            StubCache::returning(json!({ "result": true, "cutoffs": "nope" })),
        ] {
            let ctx = EnrichContext {
                cache: &cache,
                endpoints: &endpoints,
                rates: &rates,
                model: &model,
            };
            let track = open(100, START + 1).enrich(&ctx).await;
            assert!(!track.exists());
            assert_eq!(track.key(), TrackKey::new(7, Region::Cn, 100));
        }
    }

    #[tokio::test]
    async fn test_empty_series_synthesizes_latest_and_skips_forecast() {
        let cache = StubCache::returning(json!({ "result": true, "cutoffs": [] }));
        let model = no_call_model();
        let endpoints = BestdoriEndpoints::default();
        let rates = rates();
        let ctx = EnrichContext {
            cache: &cache,
            endpoints: &endpoints,
            rates: &rates,
            model: &model,
        };

        let track = open(100, START + 1).enrich(&ctx).await;
        assert_eq!(track.phase(), Some(Phase::InProgress));
        assert!(track.is_enriched());
        assert_eq!(track.latest(), Some(Snapshot::new(START, 0)));
        assert_eq!(track.rate(), None);
        assert_eq!(track.predicted_ep(), 0);
        assert_eq!(track.chart_series(false), vec![ChartPoint::new(START, 0)]);
    }

    #[tokio::test]
    async fn test_in_progress_runs_forecast_with_rate() {
        let cache = StubCache::returning(series_payload());
        let endpoints = BestdoriEndpoints::default();
        let rates = rates();
        let mut model = MockForecastModel::new();
        model
            .expect_predict()
            .withf(|series, start_sec, end_sec, rate| {
                series.len() == 2 && *start_sec == 1 && *end_sec == 1000 && *rate == Some(0.6)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Forecast { ep: 4321.7 }));
        let ctx = EnrichContext {
            cache: &cache,
            endpoints: &endpoints,
            rates: &rates,
            model: &model,
        };

        let track = open(1000, START + 1).enrich(&ctx).await;
        assert_eq!(track.rate(), Some(0.6));
        assert_eq!(track.predicted_ep(), 4321);
    }

    #[tokio::test]
    async fn test_forecast_failure_keeps_track() {
        let cache = StubCache::returning(series_payload());
        let endpoints = BestdoriEndpoints::default();
        let rates = rates();
        let mut model = MockForecastModel::new();
        model
            .expect_predict()
            .times(1)
            .returning(|_, _, _, _| Err(TierwatchError::Forecast("singular".to_string())));
        let ctx = EnrichContext {
            cache: &cache,
            endpoints: &endpoints,
            rates: &rates,
            model: &model,
        };

        let track = open(100, START + 1).enrich(&ctx).await;
        assert!(track.exists());
        assert!(track.is_enriched());
        assert_eq!(track.predicted_ep(), 0);
        assert_eq!(track.snapshots().len(), 2);
    }

    #[tokio::test]
    async fn test_chart_series_modes() {
        let cache = StubCache::returning(series_payload());
        let model = no_call_model();
        let endpoints = BestdoriEndpoints::default();
        let rates = rates();
        let ctx = EnrichContext {
            cache: &cache,
            endpoints: &endpoints,
            rates: &rates,
            model: &model,
        };

        let pending = open(100, END + 1);
        assert_eq!(pending.chart_series(true), vec![ChartPoint::new(0, 0)]);
        assert_eq!(pending.chart_series(false), vec![ChartPoint::new(START, 0)]);

        let track = pending.enrich(&ctx).await;
        assert_eq!(
            track.chart_series(true),
            vec![
                ChartPoint::new(0, 0),
                ChartPoint::new(0, 0),
                ChartPoint::new(2000, 7)
            ]
        );
        assert_eq!(
            track.chart_series(false),
            vec![
                ChartPoint::new(1000, 0),
                ChartPoint::new(1000, 5),
                ChartPoint::new(3000, 12)
            ]
        );
        // read-only
        assert_eq!(track.snapshots().len(), 2);
    }

    #[test]
    fn test_serializes_with_status_tag() {
        let value = serde_json::to_value(open(100, START + 1)).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["event_id"], 7);
        assert_eq!(value["region"], "cn");
        assert_eq!(value["phase"], "in_progress");

        let value = serde_json::to_value(open(123, START)).unwrap();
        assert_eq!(value["status"], "not_found");
        assert_eq!(value["tier"], 123);
    }
}
