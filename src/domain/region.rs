use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, TierwatchError};

/// Game server region. The discriminant is the upstream wire id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Jp = 0,
    En = 1,
    Tw = 2,
    Cn = 3,
    Kr = 4,
}

impl Region {
    pub const ALL: [Region; 5] = [Region::Jp, Region::En, Region::Tw, Region::Cn, Region::Kr];

    /// Numeric id used by the upstream tracker API (`server=` parameter).
    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Index into the per-region `startAt`/`endAt` arrays of the events listing.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Jp => "jp",
            Region::En => "en",
            Region::Tw => "tw",
            Region::Cn => "cn",
            Region::Kr => "kr",
        }
    }

    /// Localized full name as shown to players.
    pub fn full_name(&self) -> &'static str {
        match self {
            Region::Jp => "日服",
            Region::En => "国际服",
            Region::Tw => "台服",
            Region::Cn => "国服",
            Region::Kr => "韩服",
        }
    }

    /// First region in `priority` for which `has_data` holds.
    pub fn first_available<F>(priority: &[Region], mut has_data: F) -> Option<Region>
    where
        F: FnMut(Region) -> bool,
    {
        let mut seen = Vec::with_capacity(priority.len());
        for region in priority {
            if seen.contains(region) {
                continue;
            }
            seen.push(*region);
            if has_data(*region) {
                return Some(*region);
            }
        }
        None
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Region {
    type Err = TierwatchError;

    /// Accepts the short code, the numeric id, or the localized full name.
    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let by_code = match trimmed.to_ascii_lowercase().as_str() {
            "jp" => Some(Region::Jp),
            "en" => Some(Region::En),
            "tw" => Some(Region::Tw),
            "cn" => Some(Region::Cn),
            "kr" => Some(Region::Kr),
            _ => None,
        };
        by_code
            .or_else(|| trimmed.parse::<u8>().ok().and_then(Region::from_id))
            .or_else(|| Region::ALL.into_iter().find(|r| r.full_name() == trimmed))
            .ok_or_else(|| {
                TierwatchError::Validation(format!(
                    "invalid region '{raw}'; expected jp|en|tw|cn|kr"
                ))
            })
    }
}
