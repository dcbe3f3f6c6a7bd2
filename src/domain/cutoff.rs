use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::region::Region;

/// One observed cutoff sample: time in ms since epoch and event points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: i64,
    pub ep: u64,
}

impl Snapshot {
    pub fn new(time: i64, ep: u64) -> Self {
        Self { time, ep }
    }
}

/// Upstream tracker payload: `{ result, cutoffs: [{time, ep}] }`
#[derive(Debug, Clone, Deserialize)]
pub struct CutoffPayload {
    pub result: bool,
    #[serde(default)]
    pub cutoffs: Vec<Snapshot>,
}

/// Chart point; `x` is ms (absolute or offset from event start)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: i64,
    pub y: i64,
}

impl ChartPoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Tiers whose cutoffs the upstream tracker records, per region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTiers {
    tiers: BTreeMap<Region, Vec<u32>>,
}

impl TrackedTiers {
    pub fn new(tiers: BTreeMap<Region, Vec<u32>>) -> Self {
        Self { tiers }
    }

    pub fn for_region(&self, region: Region) -> &[u32] {
        self.tiers.get(&region).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, region: Region, tier: u32) -> bool {
        self.for_region(region).contains(&tier)
    }

    /// Replace one region's tier list.
    pub fn with_region(mut self, region: Region, tiers: Vec<u32>) -> Self {
        self.tiers.insert(region, tiers);
        self
    }
}

impl Default for TrackedTiers {
    fn default() -> Self {
        let full = vec![
            20, 30, 40, 50, 100, 200, 300, 400, 500, 1000, 2000, 3000, 4000, 5000, 10000, 20000,
            30000, 50000,
        ];
        let mut tiers = BTreeMap::new();
        tiers.insert(
            Region::Jp,
            vec![
                20, 30, 40, 50, 100, 200, 300, 400, 500, 1000, 2000, 5000, 10000, 20000, 30000,
                50000,
            ],
        );
        tiers.insert(Region::En, vec![50, 100, 300, 500, 1000, 2000, 2500]);
        tiers.insert(Region::Tw, vec![100, 500]);
        tiers.insert(Region::Cn, full);
        tiers.insert(Region::Kr, vec![100]);
        Self { tiers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_parses_cutoffs() {
        let payload: CutoffPayload = serde_json::from_value(json!({
            "result": true,
            "cutoffs": [{ "time": 1000, "ep": 5 }, { "time": 3000, "ep": 12 }]
        }))
        .unwrap();
        assert!(payload.result);
        assert_eq!(payload.cutoffs, vec![Snapshot::new(1000, 5), Snapshot::new(3000, 12)]);

        let negative: CutoffPayload = serde_json::from_value(json!({ "result": false })).unwrap();
        assert!(!negative.result);
        assert!(negative.cutoffs.is_empty());
    }

    #[test]
    fn test_default_tracked_tiers() {
        let tiers = TrackedTiers::default();
        assert!(tiers.contains(Region::Cn, 3000));
        assert!(!tiers.contains(Region::Jp, 3000));
        assert!(tiers.contains(Region::Kr, 100));
        assert!(!tiers.contains(Region::Kr, 500));
        assert_eq!(tiers.for_region(Region::Tw), &[100, 500]);
    }

    #[test]
    fn test_with_region_overrides() {
        let tiers = TrackedTiers::default().with_region(Region::Kr, vec![100, 1000]);
        assert!(tiers.contains(Region::Kr, 1000));
    }
}
