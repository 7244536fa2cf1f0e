//! Zone vocabulary and per-zone tallies
//!
//! The zone set is a closed, ordered enum shared by every counter. Raw
//! submissions arrive as JSON numbers (`RawZoneCounts`) and only become a
//! `ZoneCounts` after validation, so a stored tally can never hold a
//! negative or fractional value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A counted area of the auditorium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneName {
    Left,
    Middle,
    Right,
    Production,
    Outside,
}

impl ZoneName {
    /// All zones in declared (display) order
    pub const ALL: [ZoneName; 5] =
        [ZoneName::Left, ZoneName::Middle, ZoneName::Right, ZoneName::Production, ZoneName::Outside];

    /// Wire key, also used in validation messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneName::Left => "left",
            ZoneName::Middle => "middle",
            ZoneName::Right => "right",
            ZoneName::Production => "production",
            ZoneName::Outside => "outside",
        }
    }

    /// Human-facing label
    pub fn label(&self) -> &'static str {
        match self {
            ZoneName::Left => "Left",
            ZoneName::Middle => "Middle",
            ZoneName::Right => "Right",
            ZoneName::Production => "Production Room",
            ZoneName::Outside => "Outside",
        }
    }
}

impl fmt::Display for ZoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ZoneName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ZoneName::ALL
            .into_iter()
            .find(|zone| zone.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown zone '{}'", s))
    }
}

/// Unvalidated tally as submitted by a counter
///
/// Every zone key is required and unknown keys are rejected, so a tally
/// over a different zone set fails at parse time instead of being compared.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawZoneCounts {
    pub left: f64,
    pub middle: f64,
    pub right: f64,
    pub production: f64,
    pub outside: f64,
}

impl RawZoneCounts {
    pub fn get(&self, zone: ZoneName) -> f64 {
        match zone {
            ZoneName::Left => self.left,
            ZoneName::Middle => self.middle,
            ZoneName::Right => self.right,
            ZoneName::Production => self.production,
            ZoneName::Outside => self.outside,
        }
    }
}

/// Validated attendee tally, one non-negative count per zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneCounts {
    pub left: u32,
    pub middle: u32,
    pub right: u32,
    pub production: u32,
    pub outside: u32,
}

impl ZoneCounts {
    pub fn new(left: u32, middle: u32, right: u32, production: u32, outside: u32) -> Self {
        Self { left, middle, right, production, outside }
    }

    #[inline]
    pub fn get(&self, zone: ZoneName) -> u32 {
        match zone {
            ZoneName::Left => self.left,
            ZoneName::Middle => self.middle,
            ZoneName::Right => self.right,
            ZoneName::Production => self.production,
            ZoneName::Outside => self.outside,
        }
    }

    pub fn set(&mut self, zone: ZoneName, count: u32) {
        match zone {
            ZoneName::Left => self.left = count,
            ZoneName::Middle => self.middle = count,
            ZoneName::Right => self.right = count,
            ZoneName::Production => self.production = count,
            ZoneName::Outside => self.outside = count,
        }
    }

    /// Builder-style setter, handy for tests and fixtures
    pub fn with(mut self, zone: ZoneName, count: u32) -> Self {
        self.set(zone, count);
        self
    }

    /// (zone, count) pairs in declared zone order
    pub fn iter(&self) -> impl Iterator<Item = (ZoneName, u32)> + '_ {
        ZoneName::ALL.into_iter().map(move |zone| (zone, self.get(zone)))
    }

    /// Build a tally by computing each zone's count
    pub fn from_fn(mut f: impl FnMut(ZoneName) -> u32) -> Self {
        let mut counts = Self::default();
        for zone in ZoneName::ALL {
            counts.set(zone, f(zone));
        }
        counts
    }
}
