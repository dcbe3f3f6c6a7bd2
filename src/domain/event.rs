use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::region::Region;
use crate::error::{Result, TierwatchError};

/// Lifecycle phase of an event relative to wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    InProgress,
    Ended,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::NotStarted => "not_started",
            Phase::InProgress => "in_progress",
            Phase::Ended => "ended",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Region-specific run of an event, bounds in ms since epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWindow {
    pub start_at: i64,
    pub end_at: i64,
}

impl EventWindow {
    pub fn new(start_at: i64, end_at: i64) -> Self {
        Self { start_at, end_at }
    }

    /// Both bounds count as in progress.
    pub fn phase_at(&self, now_ms: i64) -> Phase {
        if now_ms < self.start_at {
            Phase::NotStarted
        } else if now_ms > self.end_at {
            Phase::Ended
        } else {
            Phase::InProgress
        }
    }

    pub fn start_sec(&self) -> i64 {
        self.start_at.div_euclid(1000)
    }

    pub fn end_sec(&self) -> i64 {
        self.end_at.div_euclid(1000)
    }
}

/// Everything the tracker needs to know about one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    pub event_id: i64,
    pub event_type: String,
    /// Per-region names, indexed by `Region::index`
    pub names: Vec<Option<String>>,
    pub start_at: [Option<i64>; 5],
    pub end_at: [Option<i64>; 5],
}

impl EventInfo {
    /// `None` when the event never ran (or is not yet scheduled) in `region`.
    pub fn window(&self, region: Region) -> Option<EventWindow> {
        let i = region.index();
        match (self.start_at[i], self.end_at[i]) {
            (Some(start), Some(end)) => Some(EventWindow::new(start, end)),
            _ => None,
        }
    }

    pub fn name(&self, region: Region) -> Option<&str> {
        self.names.get(region.index()).and_then(|n| n.as_deref())
    }
}

/// Synchronous lookup of event metadata by id
pub trait EventWindowProvider: Send + Sync {
    fn lookup(&self, event_id: i64) -> Option<EventInfo>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    event_type: String,
    #[serde(default)]
    event_name: Vec<Option<String>>,
    #[serde(default)]
    start_at: Vec<Option<String>>,
    #[serde(default)]
    end_at: Vec<Option<String>>,
}

fn parse_timestamps(event_id: i64, raw: &[Option<String>]) -> Result<[Option<i64>; 5]> {
    let mut out = [None; 5];
    for (slot, value) in out.iter_mut().zip(raw.iter()) {
        if let Some(text) = value {
            let ts = text.trim().parse::<i64>().map_err(|e| {
                TierwatchError::InvalidCatalog(format!(
                    "event {event_id}: bad timestamp '{text}': {e}"
                ))
            })?;
            *slot = Some(ts);
        }
    }
    Ok(out)
}

/// In-memory events listing, loaded once from the upstream catalog
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    events: BTreeMap<i64, EventInfo>,
}

impl EventCatalog {
    pub fn new(events: impl IntoIterator<Item = EventInfo>) -> Self {
        Self {
            events: events.into_iter().map(|e| (e.event_id, e)).collect(),
        }
    }

    /// Parse the upstream events listing: an object keyed by event id.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            TierwatchError::InvalidCatalog("events listing is not a JSON object".to_string())
        })?;

        let mut events = BTreeMap::new();
        for (key, raw) in object {
            let event_id = key.parse::<i64>().map_err(|e| {
                TierwatchError::InvalidCatalog(format!("bad event id '{key}': {e}"))
            })?;
            let raw: RawEvent = serde_json::from_value(raw.clone())?;
            let info = EventInfo {
                event_id,
                event_type: raw.event_type,
                names: raw.event_name,
                start_at: parse_timestamps(event_id, &raw.start_at)?,
                end_at: parse_timestamps(event_id, &raw.end_at)?,
            };
            events.insert(event_id, info);
        }

        Ok(Self { events })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The event a region is currently running, or failing that the one
    /// that started most recently. Events not yet started are ignored.
    pub fn present_event(&self, region: Region, now_ms: i64) -> Option<&EventInfo> {
        let mut latest_started: Option<(&EventInfo, i64)> = None;
        for info in self.events.values() {
            let Some(window) = info.window(region) else {
                continue;
            };
            match window.phase_at(now_ms) {
                Phase::InProgress => return Some(info),
                Phase::Ended => {
                    if latest_started.map_or(true, |(_, start)| window.start_at >= start) {
                        latest_started = Some((info, window.start_at));
                    }
                }
                Phase::NotStarted => {}
            }
        }
        latest_started.map(|(info, _)| info)
    }
}

impl EventWindowProvider for EventCatalog {
    fn lookup(&self, event_id: i64) -> Option<EventInfo> {
        self.events.get(&event_id).cloned()
    }
}
