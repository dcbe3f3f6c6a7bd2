use serde::{Deserialize, Serialize};

use super::region::Region;
use crate::error::{Result, TierwatchError};

/// Historical participation rate for one (region, event type, tier)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateRow {
    pub region: Region,
    pub event_type: String,
    pub tier: u32,
    pub rate: f64,
}

#[derive(Debug, Deserialize)]
struct RawRateRow {
    server: u8,
    #[serde(rename = "type")]
    event_type: String,
    tier: u32,
    rate: f64,
}

/// Read-only rate classification table, loaded once per process
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rows: Vec<RateRow>,
}

impl RateTable {
    pub fn new(rows: Vec<RateRow>) -> Self {
        Self { rows }
    }

    /// Parse the upstream rates listing. Rows for unknown server ids are skipped.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let raw: Vec<RawRateRow> = serde_json::from_value(value.clone()).map_err(|e| {
            TierwatchError::InvalidCatalog(format!("rates listing is malformed: {e}"))
        })?;

        let rows = raw
            .into_iter()
            .filter_map(|r| {
                Region::from_id(r.server).map(|region| RateRow {
                    region,
                    event_type: r.event_type,
                    tier: r.tier,
                    rate: r.rate,
                })
            })
            .collect();

        Ok(Self { rows })
    }

    /// Exact match on all three keys. The first matching row wins.
    pub fn lookup(&self, region: Region, event_type: &str, tier: u32) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.region == region && row.event_type == event_type && row.tier == tier)
            .map(|row| row.rate)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
