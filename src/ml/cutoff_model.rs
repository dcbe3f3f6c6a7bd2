//! Final-score forecasting for a tier's cutoff series.
//!
//! The tracker only depends on the [`ForecastModel`] contract. [`TrendModel`]
//! is the built-in implementation: a least-squares trend over the recent part
//! of the series, projected to the event end.
//!
//! Design goals:
//! - Deterministic, dependency-light.
//! - Explicit input validation (fail fast, caller falls back to 0).

use serde::{Deserialize, Serialize};

use crate::error::{Result, TierwatchError};

/// A cutoff sample with time truncated to whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondSample {
    pub time: i64,
    pub ep: u64,
}

/// Model output; `ep` is the predicted final score, possibly fractional
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub ep: f64,
}

#[cfg_attr(test, mockall::automock)]
pub trait ForecastModel: Send + Sync {
    /// Predict the final score at `end_sec` from `series`.
    ///
    /// `rate` is the tier's historical participation rate, when known.
    fn predict(
        &self,
        series: &[SecondSample],
        start_sec: i64,
        end_sec: i64,
        rate: Option<f64>,
    ) -> Result<Forecast>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendModel {
    /// Only samples this close to the newest one shape the slope.
    /// Falls back to the whole series when the window holds fewer than 2 points.
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: i64,
}

fn default_lookback_secs() -> i64 {
    24 * 3600
}

impl Default for TrendModel {
    fn default() -> Self {
        Self {
            lookback_secs: default_lookback_secs(),
        }
    }
}

impl TrendModel {
    pub fn new(lookback_secs: i64) -> Self {
        Self { lookback_secs }
    }

    /// Least-squares slope (points per second) through `points`.
    fn slope(points: &[(f64, f64)]) -> Result<f64> {
        let n = points.len() as f64;
        let mean_t = points.iter().map(|(t, _)| t).sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut cov = 0.0;
        let mut var = 0.0;
        for (t, y) in points {
            cov += (t - mean_t) * (y - mean_y);
            var += (t - mean_t).powi(2);
        }

        if var <= f64::EPSILON {
            return Err(TierwatchError::Forecast(
                "degenerate series: all samples share one timestamp".to_string(),
            ));
        }
        Ok(cov / var)
    }
}

impl ForecastModel for TrendModel {
    fn predict(
        &self,
        series: &[SecondSample],
        start_sec: i64,
        end_sec: i64,
        rate: Option<f64>,
    ) -> Result<Forecast> {
        let last = series
            .last()
            .ok_or_else(|| TierwatchError::Forecast("empty series".to_string()))?;
        if end_sec <= start_sec {
            return Err(TierwatchError::Forecast(format!(
                "invalid window: start {start_sec} >= end {end_sec}"
            )));
        }
        if let Some(r) = rate {
            if !r.is_finite() {
                return Err(TierwatchError::Forecast(format!("invalid rate {r}")));
            }
        }

        // Every series starts from zero points at the event start.
        let mut points: Vec<(f64, f64)> = Vec::with_capacity(series.len() + 1);
        points.push((start_sec as f64, 0.0));
        points.extend(series.iter().map(|s| (s.time as f64, s.ep as f64)));

        let horizon = last.time - self.lookback_secs;
        let recent: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|(t, _)| *t >= horizon as f64)
            .collect();
        let slope = if recent.len() >= 2 {
            Self::slope(&recent).or_else(|_| Self::slope(&points))?
        } else {
            Self::slope(&points)?
        };

        // Cutoffs never go down.
        let slope = slope.max(0.0);
        let remaining = (end_sec - last.time).max(0) as f64;
        let boost = 1.0 + rate.unwrap_or(0.0).max(0.0);

        Ok(Forecast {
            ep: last.ep as f64 + slope * remaining * boost,
        })
    }
}
