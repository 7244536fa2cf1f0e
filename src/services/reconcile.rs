//! Dual-counter reconciliation: discrepancy detection, confirmation gate, merge
//!
//! All three are pure functions of two entries. The gate decides *whether*
//! a pair may be confirmed; the merge decides *what* the confirmed tally is
//! and refuses to run on a pair the gate would reject.

use crate::domain::error::WelcomeError;
use crate::domain::headcount::{HeadcountDiscrepancy, HeadcountEntry, DISCREPANCY_THRESHOLD};
use crate::domain::zone::{ZoneCounts, ZoneName};

/// Zones where the two tallies differ by more than the tolerance, in zone order
///
/// Returns an empty list when either entry is missing.
pub fn find_discrepancies(
    entry_a: Option<&HeadcountEntry>,
    entry_b: Option<&HeadcountEntry>,
) -> Vec<HeadcountDiscrepancy> {
    let (Some(a), Some(b)) = (entry_a, entry_b) else {
        return Vec::new();
    };

    ZoneName::ALL
        .into_iter()
        .filter_map(|zone| {
            let count_a = a.counts.get(zone);
            let count_b = b.counts.get(zone);
            let diff = count_a.abs_diff(count_b);
            (diff > DISCREPANCY_THRESHOLD).then_some(HeadcountDiscrepancy { zone, count_a, count_b, diff })
        })
        .collect()
}

/// Whether the pair may be confirmed: both present and no discrepant zone
pub fn can_confirm(entry_a: Option<&HeadcountEntry>, entry_b: Option<&HeadcountEntry>) -> bool {
    entry_a.is_some() && entry_b.is_some() && find_discrepancies(entry_a, entry_b).is_empty()
}

/// Average of two counts, halves rounded up
///
/// Counts are non-negative, so this matches rounding half away from zero.
#[inline]
pub fn round_half_up_average(a: u32, b: u32) -> u32 {
    // u64 so a + b + 1 cannot overflow; the result always fits back in u32
    ((u64::from(a) + u64::from(b) + 1) / 2) as u32
}

/// Merge a confirmable pair into the authoritative tally
pub fn merge_confirmed_counts(
    entry_a: &HeadcountEntry,
    entry_b: &HeadcountEntry,
) -> Result<ZoneCounts, WelcomeError> {
    let discrepancies = find_discrepancies(Some(entry_a), Some(entry_b));
    if !discrepancies.is_empty() {
        let zones: Vec<&str> = discrepancies.iter().map(|d| d.zone.as_str()).collect();
        return Err(WelcomeError::PreconditionViolation(format!(
            "cannot merge discrepant entries from {} and {} (zones: {})",
            entry_a.counter_name,
            entry_b.counter_name,
            zones.join(", ")
        )));
    }

    Ok(ZoneCounts::from_fn(|zone| round_half_up_average(entry_a.counts.get(zone), entry_b.counts.get(zone))))
}
