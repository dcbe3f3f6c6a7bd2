use tracing::{debug, warn};

use crate::domain::{EventWindow, Snapshot};
use crate::ml::{ForecastModel, SecondSample};

/// Convert a ms series to the model's whole-second granularity.
pub fn to_second_samples(snapshots: &[Snapshot]) -> Vec<SecondSample> {
    snapshots
        .iter()
        .map(|s| SecondSample {
            time: s.time.div_euclid(1000),
            ep: s.ep,
        })
        .collect()
}

/// Predicted final score, floored. Any model failure yields 0.
pub fn predict_final_ep(
    model: &dyn ForecastModel,
    snapshots: &[Snapshot],
    window: EventWindow,
    rate: Option<f64>,
) -> u64 {
    let series = to_second_samples(snapshots);
    match model.predict(&series, window.start_sec(), window.end_sec(), rate) {
        Ok(forecast) if forecast.ep.is_finite() && forecast.ep >= 0.0 => {
            let ep = forecast.ep.floor() as u64;
            debug!("Forecast final ep {} from {} samples", ep, series.len());
            ep
        }
        Ok(forecast) => {
            warn!("Forecast model returned unusable ep {}, using 0", forecast.ep);
            0
        }
        Err(e) => {
            warn!("Forecast model failed, using 0: {}", e);
            0
        }
    }
}
