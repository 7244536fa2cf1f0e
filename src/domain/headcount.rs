//! Headcount records: counter identity, entries, discrepancies and confirmations

use crate::domain::zone::{ZoneCounts, ZoneName};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Per-zone tolerance between two counters; differences above this are discrepancies
pub const DISCREPANCY_THRESHOLD: u32 = 5;

/// Generate a new UUIDv7 (time-sortable) record id
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Store-assigned entry id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn generate() -> Self {
        Self(new_uuid_v7())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of one service (a gathering whose seats, requests and counts belong together)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub String);

impl ServiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Default service key for a calendar day: `service-YYYY-MM-DD`
    pub fn for_date(date: ServiceDate) -> Self {
        Self(format!("service-{}", date))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Calendar day a confirmation belongs to, rendered `YYYY-MM-DD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceDate(pub NaiveDate);

impl fmt::Display for ServiceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl std::str::FromStr for ServiceDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map(ServiceDate)
    }
}

/// Free-text counter identity
///
/// Keeps the name as typed (trimmed) for display, and compares on a
/// lowercased key so "Sam" and "sam " are the same counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CounterName {
    display: String,
    key: String,
}

impl CounterName {
    /// Returns None for names that are empty after trimming
    pub fn parse(name: &str) -> Option<Self> {
        let display = name.trim();
        if display.is_empty() {
            return None;
        }
        Some(Self { display: display.to_string(), key: display.to_lowercase() })
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Case-insensitive identity key
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for CounterName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for CounterName {}

impl Hash for CounterName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for CounterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl TryFrom<String> for CounterName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CounterName::parse(&value).ok_or_else(|| "counter name cannot be empty".to_string())
    }
}

impl From<CounterName> for String {
    fn from(name: CounterName) -> Self {
        name.display
    }
}

/// One counter's submitted tally; immutable once stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadcountEntry {
    pub id: EntryId,
    pub counter_name: CounterName,
    pub counts: ZoneCounts,
    pub total: u64,
    /// Store-assigned write time; authoritative for "most recent"
    pub submitted_at: DateTime<Utc>,
}

/// A zone where two counters differ by more than the tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadcountDiscrepancy {
    pub zone: ZoneName,
    pub count_a: u32,
    pub count_b: u32,
    pub diff: u32,
}

/// Confirmation request handed to the store (timestamp is assigned on write)
#[derive(Debug, Clone, PartialEq)]
pub struct NewConfirmedCount {
    pub date: ServiceDate,
    pub counter_a: HeadcountEntry,
    pub counter_b: HeadcountEntry,
    pub totals: ZoneCounts,
}

/// The authoritative attendance record for one service day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedCount {
    pub date: ServiceDate,
    pub counter_a: HeadcountEntry,
    pub counter_b: HeadcountEntry,
    pub confirmed: bool,
    pub totals: ZoneCounts,
    pub confirmed_at: DateTime<Utc>,
}

impl ConfirmedCount {
    /// Grand total of the merged tally
    pub fn total(&self) -> u64 {
        self.totals.iter().map(|(_, count)| u64::from(count)).sum()
    }
}
