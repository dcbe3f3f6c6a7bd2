use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use tierwatch::adapters::{BestdoriEndpoints, BestdoriHttp, ResponseCache, SingleFlightCache};
use tierwatch::cli::{Cli, Commands};
use tierwatch::config::AppConfig;
use tierwatch::domain::{ChartPoint, EventCatalog, Region};
use tierwatch::error::{Result, TierwatchError};
use tierwatch::ml::TrendModel;
use tierwatch::tracker::{present_event, CutoffTrack, CutoffTracker};
use tracing::{info, warn};

mod main_runtime;

use main_runtime::init_logging;

#[derive(Serialize)]
struct TrackReport<'a> {
    track: &'a CutoffTrack,
    #[serde(skip_serializing_if = "Option::is_none")]
    chart: Option<Vec<ChartPoint>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = AppConfig::load_from(&cli.config_dir)?;
    cfg.validate()
        .map_err(|errors| TierwatchError::Validation(errors.join("; ")))?;
    init_logging(&cfg.logging);

    let http = BestdoriHttp::new(cfg.upstream.timeout(), &cfg.upstream.user_agent)?;
    let cache: Arc<dyn ResponseCache> = Arc::new(SingleFlightCache::new(http, cfg.cache.ttl()));
    let model = Arc::new(TrendModel::new(cfg.forecast.lookback_secs));
    let (tracker, catalog) = CutoffTracker::bootstrap(
        cache,
        model,
        BestdoriEndpoints::new(&cfg.upstream.base_url),
        cfg.tracked_tiers(),
    )
    .await?;

    match cli.command {
        Commands::Track {
            tier,
            region,
            event,
            chart,
            zero_baseline,
        } => {
            let region = resolve_region(region, &cfg, &catalog)?;
            let event_id = resolve_event(event, region, &catalog)?;
            let track = tracker.track(event_id, region, tier).await;
            if !track.exists() {
                warn!("No cutoff data for {}", track.key());
            }
            let report = TrackReport {
                track: &track,
                chart: chart.then(|| track.chart_series(zero_baseline)),
            };
            print_json(&report)?;
        }
        Commands::Tiers { region, event } => {
            let region = resolve_region(region, &cfg, &catalog)?;
            let event_id = resolve_event(event, region, &catalog)?;
            let tracks = tracker.track_tiers(event_id, region).await;
            info!(
                "{} of {} tiers have data for event {} in {}",
                tracks.iter().filter(|t| t.exists()).count(),
                tracks.len(),
                event_id,
                region
            );
            print_json(&tracks)?;
        }
        Commands::Present { region } => {
            let region = resolve_region(region, &cfg, &catalog)?;
            let event = present_event(&catalog, region).ok_or_else(|| {
                TierwatchError::Validation(format!("no event has started in {region}"))
            })?;
            print_json(event)?;
        }
    }

    Ok(())
}

fn resolve_region(region: Option<Region>, cfg: &AppConfig, catalog: &EventCatalog) -> Result<Region> {
    if let Some(region) = region {
        return Ok(region);
    }
    Region::first_available(&cfg.region_priority, |r| present_event(catalog, r).is_some())
        .ok_or_else(|| TierwatchError::Validation("no region has a current event".to_string()))
}

fn resolve_event(event: Option<i64>, region: Region, catalog: &EventCatalog) -> Result<i64> {
    match event {
        Some(event_id) => Ok(event_id),
        None => present_event(catalog, region)
            .map(|e| e.event_id)
            .ok_or_else(|| TierwatchError::Validation(format!("no event has started in {region}"))),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
