//! Counter pairing and workflow phase
//!
//! Picks the two counters whose tallies are compared. Slots go to the first
//! two distinct counter names in insertion order; each slot holds that
//! counter's most recent entry, so a resubmission replaces its own earlier
//! tally. Counters that appear after the first two never get a slot - they
//! are reported as ignored so the limitation stays visible.

use crate::domain::headcount::{CounterName, HeadcountEntry};
use crate::services::reconcile::find_discrepancies;
use serde::Serialize;

/// The two compared entries plus any counters left out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterPair<'a> {
    pub counter_a: Option<&'a HeadcountEntry>,
    pub counter_b: Option<&'a HeadcountEntry>,
    /// Distinct counters in first-appearance order
    pub counter_names: Vec<&'a CounterName>,
    /// Counters beyond the first two; stored but never compared
    pub ignored_counters: Vec<&'a CounterName>,
}

/// Most recent entry for a counter; equal timestamps go to the later insertion
pub fn latest_entry_for<'a>(entries: &'a [HeadcountEntry], name: &CounterName) -> Option<&'a HeadcountEntry> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.counter_name == *name)
        .max_by_key(|(position, entry)| (entry.submitted_at, *position))
        .map(|(_, entry)| entry)
}

/// Select Counter A and Counter B from a full entry snapshot
pub fn select_counter_pair(entries: &[HeadcountEntry]) -> CounterPair<'_> {
    let mut counter_names: Vec<&CounterName> = Vec::new();
    for entry in entries {
        if !counter_names.contains(&&entry.counter_name) {
            counter_names.push(&entry.counter_name);
        }
    }

    let counter_a = counter_names.first().and_then(|name| latest_entry_for(entries, name));
    let counter_b = counter_names.get(1).and_then(|name| latest_entry_for(entries, name));
    let ignored_counters = counter_names.iter().skip(2).copied().collect();

    CounterPair { counter_a, counter_b, counter_names, ignored_counters }
}

/// Where a service day stands in the submit / confirm workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadcountPhase {
    NoEntries,
    OneSubmitted,
    /// Both slots filled; `discrepant` when any zone is over tolerance
    TwoSubmitted { discrepant: bool },
    /// Terminal for the service day
    Confirmed,
}

impl HeadcountPhase {
    /// Derive the phase from the data present
    pub fn derive(pair: &CounterPair<'_>, confirmed: bool) -> Self {
        if confirmed {
            return HeadcountPhase::Confirmed;
        }
        match (pair.counter_a, pair.counter_b) {
            (None, _) => HeadcountPhase::NoEntries,
            (Some(_), None) => HeadcountPhase::OneSubmitted,
            (a @ Some(_), b @ Some(_)) => {
                HeadcountPhase::TwoSubmitted { discrepant: !find_discrepancies(a, b).is_empty() }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeadcountPhase::NoEntries => "no_entries",
            HeadcountPhase::OneSubmitted => "one_submitted",
            HeadcountPhase::TwoSubmitted { discrepant: false } => "two_submitted_matching",
            HeadcountPhase::TwoSubmitted { discrepant: true } => "two_submitted_discrepant",
            HeadcountPhase::Confirmed => "confirmed",
        }
    }

    /// Numeric code for the phase gauge
    pub fn code(&self) -> u64 {
        match self {
            HeadcountPhase::NoEntries => 0,
            HeadcountPhase::OneSubmitted => 1,
            HeadcountPhase::TwoSubmitted { discrepant: true } => 2,
            HeadcountPhase::TwoSubmitted { discrepant: false } => 3,
            HeadcountPhase::Confirmed => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::zone::{ZoneCounts, ZoneName};
    use crate::services::reconcile::fixtures::entry;

    fn counts(left: u32) -> ZoneCounts {
        ZoneCounts::new(left, 80, 40, 5, 2)
    }

    #[test]
    fn test_empty_snapshot() {
        let pair = select_counter_pair(&[]);
        assert!(pair.counter_a.is_none());
        assert!(pair.counter_b.is_none());
        assert!(pair.counter_names.is_empty());
        assert_eq!(HeadcountPhase::derive(&pair, false), HeadcountPhase::NoEntries);
    }

    #[test]
    fn test_single_counter() {
        let entries = vec![entry("Sam", counts(50), 1), entry("Sam", counts(51), 2)];
        let pair = select_counter_pair(&entries);
        assert_eq!(pair.counter_a.unwrap().counts.left, 51);
        assert!(pair.counter_b.is_none());
        assert_eq!(pair.counter_names.len(), 1);
        assert_eq!(HeadcountPhase::derive(&pair, false), HeadcountPhase::OneSubmitted);
    }

    #[test]
    fn test_first_counter_uses_latest_entry() {
        let entries = vec![entry("A", counts(10), 1), entry("B", counts(20), 2), entry("A", counts(30), 3)];
        let pair = select_counter_pair(&entries);
        assert_eq!(pair.counter_a.unwrap().submitted_at, entries[2].submitted_at);
        assert_eq!(pair.counter_a.unwrap().counts.left, 30);
        assert_eq!(pair.counter_b.unwrap().counts.left, 20);
    }

    #[test]
    fn test_slot_order_follows_insertion_not_time() {
        // B was inserted first even though A's timestamp is older
        let entries = vec![entry("B", counts(20), 5), entry("A", counts(10), 1)];
        let pair = select_counter_pair(&entries);
        assert_eq!(pair.counter_a.unwrap().counter_name.as_str(), "B");
        assert_eq!(pair.counter_b.unwrap().counter_name.as_str(), "A");
    }

    #[test]
    fn test_names_match_case_insensitively() {
        let entries = vec![entry("Sam", counts(50), 1), entry("Lee", counts(50), 2), entry("SAM", counts(52), 3)];
        let pair = select_counter_pair(&entries);
        assert_eq!(pair.counter_names.len(), 2);
        assert_eq!(pair.counter_a.unwrap().counts.left, 52);
        assert!(pair.ignored_counters.is_empty());
    }

    #[test]
    fn test_third_counter_is_ignored() {
        let entries = vec![
            entry("Sam", counts(50), 1),
            entry("Lee", counts(70), 2),
            entry("Kim", counts(50), 3),
        ];
        let pair = select_counter_pair(&entries);
        assert_eq!(pair.counter_a.unwrap().counter_name.as_str(), "Sam");
        assert_eq!(pair.counter_b.unwrap().counter_name.as_str(), "Lee");
        assert_eq!(pair.ignored_counters.len(), 1);
        assert_eq!(pair.ignored_counters[0].as_str(), "Kim");
        assert_eq!(HeadcountPhase::derive(&pair, false), HeadcountPhase::TwoSubmitted { discrepant: true });
    }

    #[test]
    fn test_equal_timestamps_prefer_later_insertion() {
        let entries = vec![entry("Sam", counts(50), 4), entry("Sam", counts(55), 4)];
        let pair = select_counter_pair(&entries);
        assert_eq!(pair.counter_a.unwrap().counts.left, 55);
    }

    #[test]
    fn test_resubmission_clears_discrepancy() {
        let mut entries = vec![entry("Sam", counts(50), 1), entry("Lee", counts(60), 2)];
        let phase = HeadcountPhase::derive(&select_counter_pair(&entries), false);
        assert_eq!(phase, HeadcountPhase::TwoSubmitted { discrepant: true });

        entries.push(entry("Lee", counts(52), 3));
        let pair = select_counter_pair(&entries);
        assert_eq!(HeadcountPhase::derive(&pair, false), HeadcountPhase::TwoSubmitted { discrepant: false });
        assert_eq!(pair.counter_b.unwrap().counts.get(ZoneName::Left), 52);
    }

    #[test]
    fn test_confirmed_overrides() {
        let entries = vec![entry("Sam", counts(50), 1)];
        let pair = select_counter_pair(&entries);
        assert_eq!(HeadcountPhase::derive(&pair, true), HeadcountPhase::Confirmed);
        assert_eq!(HeadcountPhase::Confirmed.as_str(), "confirmed");
    }
}
