//! Forecasting models for tier cutoffs.
//!
//! This module is intentionally dependency-light so predictions stay cheap
//! enough to run inline with every tracker request.

pub mod cutoff_model;

pub use cutoff_model::{Forecast, ForecastModel, SecondSample, TrendModel};
