//! Lock-free metrics collection and periodic reporting
//!
//! Counters are atomics updated from the services and the monitor task.
//! `report()` swaps the periodic counters to zero for the log summary;
//! `snapshot()` reads cumulative values for the Prometheus endpoint without
//! resetting anything, so the two readers never disturb each other.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are
//! statistical counters only and never drive workflow decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    std::array::from_fn(|i| buckets[i].swap(0, Ordering::Relaxed))
}

#[inline]
fn load_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    std::array::from_fn(|i| buckets[i].load(Ordering::Relaxed))
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Last bucket uses 2x the previous bound
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Entries accepted and stored (monotonic)
    entries_submitted: AtomicU64,
    /// Submissions rejected by validation (monotonic)
    submissions_rejected: AtomicU64,
    /// Confirmed counts created (monotonic)
    confirmations: AtomicU64,
    /// Confirmations refused because the day was already confirmed (monotonic)
    confirmation_conflicts: AtomicU64,
    /// Confirm attempts on a pair the gate rejects (monotonic)
    precondition_violations: AtomicU64,
    /// Store writes or subscriptions that failed (monotonic)
    store_errors: AtomicU64,
    /// Journal appends that failed (monotonic)
    journal_failures: AtomicU64,
    /// Seat occupancy writes (monotonic)
    seat_updates: AtomicU64,
    requests_submitted: AtomicU64,
    requests_resolved: AtomicU64,
    /// Snapshot evaluations by the monitor (monotonic)
    snapshots_evaluated: AtomicU64,
    /// Evaluations since last report (reset on report)
    snapshots_since_report: AtomicU64,
    /// Evaluation latency, cumulative (never reset; feeds Prometheus)
    eval_latency_buckets: [AtomicU64; NUM_BUCKETS],
    eval_latency_sum_us: AtomicU64,
    /// Evaluation latency since last report (reset on report)
    eval_report_buckets: [AtomicU64; NUM_BUCKETS],
    eval_report_sum_us: AtomicU64,
    eval_report_max_us: AtomicU64,
    /// Current phase code (see `HeadcountPhase::code`)
    phase: AtomicU64,
    /// Zones currently over tolerance
    discrepant_zones: AtomicU64,
    /// Distinct counters beyond the compared pair
    ignored_counters: AtomicU64,
    /// Total of the latest confirmed count, 0 when none
    confirmed_total: AtomicU64,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            entries_submitted: AtomicU64::new(0),
            submissions_rejected: AtomicU64::new(0),
            confirmations: AtomicU64::new(0),
            confirmation_conflicts: AtomicU64::new(0),
            precondition_violations: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
            journal_failures: AtomicU64::new(0),
            seat_updates: AtomicU64::new(0),
            requests_submitted: AtomicU64::new(0),
            requests_resolved: AtomicU64::new(0),
            snapshots_evaluated: AtomicU64::new(0),
            snapshots_since_report: AtomicU64::new(0),
            eval_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            eval_latency_sum_us: AtomicU64::new(0),
            eval_report_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            eval_report_sum_us: AtomicU64::new(0),
            eval_report_max_us: AtomicU64::new(0),
            phase: AtomicU64::new(0),
            discrepant_zones: AtomicU64::new(0),
            ignored_counters: AtomicU64::new(0),
            confirmed_total: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_entry_submitted(&self) {
        self.entries_submitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_submission_rejected(&self) {
        self.submissions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_confirmation(&self) {
        self.confirmations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_confirmation_conflict(&self) {
        self.confirmation_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_precondition_violation(&self) {
        self.precondition_violations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_journal_failure(&self) {
        self.journal_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_seat_update(&self) {
        self.seat_updates.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_request_submitted(&self) {
        self.requests_submitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_request_resolved(&self) {
        self.requests_resolved.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one snapshot evaluation and its latency
    #[inline]
    pub fn record_snapshot_evaluated(&self, latency_us: u64) {
        self.snapshots_evaluated.fetch_add(1, Ordering::Relaxed);
        self.snapshots_since_report.fetch_add(1, Ordering::Relaxed);

        let bucket = bucket_index(latency_us);
        self.eval_latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.eval_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.eval_report_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.eval_report_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.eval_report_max_us, latency_us);
    }

    /// Publish the derived workflow state
    #[inline]
    pub fn set_headcount_state(&self, phase: u64, discrepant_zones: u64, ignored_counters: u64) {
        self.phase.store(phase, Ordering::Relaxed);
        self.discrepant_zones.store(discrepant_zones, Ordering::Relaxed);
        self.ignored_counters.store(ignored_counters, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_confirmed_total(&self, total: u64) {
        self.confirmed_total.store(total, Ordering::Relaxed);
    }

    #[inline]
    pub fn entries_submitted(&self) -> u64 {
        self.entries_submitted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn confirmations(&self) -> u64 {
        self.confirmations.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn confirmation_conflicts(&self) -> u64 {
        self.confirmation_conflicts.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn store_errors(&self) -> u64 {
        self.store_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn phase(&self) -> u64 {
        self.phase.load(Ordering::Relaxed)
    }

    /// Cumulative values for exposition; resets nothing
    pub fn snapshot(&self) -> MetricsSnapshot {
        let eval_buckets = load_buckets(&self.eval_latency_buckets);
        MetricsSnapshot {
            entries_submitted: self.entries_submitted.load(Ordering::Relaxed),
            submissions_rejected: self.submissions_rejected.load(Ordering::Relaxed),
            confirmations: self.confirmations.load(Ordering::Relaxed),
            confirmation_conflicts: self.confirmation_conflicts.load(Ordering::Relaxed),
            precondition_violations: self.precondition_violations.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            journal_failures: self.journal_failures.load(Ordering::Relaxed),
            seat_updates: self.seat_updates.load(Ordering::Relaxed),
            requests_submitted: self.requests_submitted.load(Ordering::Relaxed),
            requests_resolved: self.requests_resolved.load(Ordering::Relaxed),
            snapshots_evaluated: self.snapshots_evaluated.load(Ordering::Relaxed),
            eval_latency_p99_us: percentile_from_buckets(&eval_buckets, 0.99),
            eval_buckets,
            eval_latency_sum_us: self.eval_latency_sum_us.load(Ordering::Relaxed),
            phase: self.phase.load(Ordering::Relaxed),
            discrepant_zones: self.discrepant_zones.load(Ordering::Relaxed),
            ignored_counters: self.ignored_counters.load(Ordering::Relaxed),
            confirmed_total: self.confirmed_total.load(Ordering::Relaxed),
        }
    }

    /// Calculate and return metrics summary, then reset periodic counters
    ///
    /// This is the only method that resets counters.
    pub fn report(&self) -> MetricsSummary {
        let evaluations = self.snapshots_since_report.swap(0, Ordering::Relaxed);
        let eval_sum = self.eval_report_sum_us.swap(0, Ordering::Relaxed);
        let eval_max = self.eval_report_max_us.swap(0, Ordering::Relaxed);
        let eval_buckets = swap_buckets(&self.eval_report_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let evaluations_per_min = if elapsed.as_secs_f64() > 0.0 {
            evaluations as f64 * 60.0 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        MetricsSummary {
            entries_submitted: self.entries_submitted.load(Ordering::Relaxed),
            submissions_rejected: self.submissions_rejected.load(Ordering::Relaxed),
            confirmations: self.confirmations.load(Ordering::Relaxed),
            confirmation_conflicts: self.confirmation_conflicts.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            open_requests: self
                .requests_submitted
                .load(Ordering::Relaxed)
                .saturating_sub(self.requests_resolved.load(Ordering::Relaxed)),
            evaluations,
            evaluations_per_min,
            eval_avg_us: if evaluations > 0 { eval_sum / evaluations } else { 0 },
            eval_max_us: eval_max,
            eval_p99_us: percentile_from_buckets(&eval_buckets, 0.99),
            phase: self.phase.load(Ordering::Relaxed),
            discrepant_zones: self.discrepant_zones.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of histogram buckets (exported for exposition)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

/// Cumulative counters and gauges for the Prometheus endpoint
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub entries_submitted: u64,
    pub submissions_rejected: u64,
    pub confirmations: u64,
    pub confirmation_conflicts: u64,
    pub precondition_violations: u64,
    pub store_errors: u64,
    pub journal_failures: u64,
    pub seat_updates: u64,
    pub requests_submitted: u64,
    pub requests_resolved: u64,
    pub snapshots_evaluated: u64,
    /// Evaluation latency histogram buckets (per-bucket, not cumulative)
    pub eval_buckets: [u64; NUM_BUCKETS],
    pub eval_latency_sum_us: u64,
    pub eval_latency_p99_us: u64,
    pub phase: u64,
    pub discrepant_zones: u64,
    pub ignored_counters: u64,
    pub confirmed_total: u64,
}

/// Periodic summary for the log
#[derive(Debug)]
pub struct MetricsSummary {
    pub entries_submitted: u64,
    pub submissions_rejected: u64,
    pub confirmations: u64,
    pub confirmation_conflicts: u64,
    pub store_errors: u64,
    /// Submitted minus resolved requests
    pub open_requests: u64,
    /// Snapshot evaluations since the previous report
    pub evaluations: u64,
    pub evaluations_per_min: f64,
    pub eval_avg_us: u64,
    pub eval_max_us: u64,
    pub eval_p99_us: u64,
    pub phase: u64,
    pub discrepant_zones: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            entries = %self.entries_submitted,
            rejected = %self.submissions_rejected,
            confirmations = %self.confirmations,
            conflicts = %self.confirmation_conflicts,
            store_errors = %self.store_errors,
            open_requests = %self.open_requests,
            evaluations = %self.evaluations,
            evaluations_per_min = format!("{:.1}", self.evaluations_per_min),
            eval_avg_us = %self.eval_avg_us,
            eval_p99_us = %self.eval_p99_us,
            phase = %self.phase,
            discrepant_zones = %self.discrepant_zones,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.entries_submitted(), 0);
        assert_eq!(metrics.confirmations(), 0);
        assert_eq!(metrics.phase(), 0);
    }

    #[test]
    fn test_record_counters() {
        let metrics = Metrics::new();

        metrics.record_entry_submitted();
        metrics.record_entry_submitted();
        metrics.record_submission_rejected();
        metrics.record_confirmation();
        metrics.record_confirmation_conflict();
        metrics.record_store_error();

        assert_eq!(metrics.entries_submitted(), 2);
        assert_eq!(metrics.confirmations(), 1);
        assert_eq!(metrics.confirmation_conflicts(), 1);
        assert_eq!(metrics.store_errors(), 1);
        assert_eq!(metrics.snapshot().submissions_rejected, 1);
    }

    #[test]
    fn test_report_resets_periodic_counters() {
        let metrics = Metrics::new();

        metrics.record_snapshot_evaluated(100);
        metrics.record_snapshot_evaluated(200);
        metrics.record_snapshot_evaluated(300);
        metrics.record_entry_submitted();

        let summary = metrics.report();
        assert_eq!(summary.evaluations, 3);
        assert_eq!(summary.eval_avg_us, 200);
        assert_eq!(summary.eval_max_us, 300);
        assert_eq!(summary.entries_submitted, 1);

        let summary = metrics.report();
        assert_eq!(summary.evaluations, 0);
        assert_eq!(summary.eval_avg_us, 0);
        assert_eq!(summary.eval_max_us, 0);
        // Monotonic counters survive the reset
        assert_eq!(summary.entries_submitted, 1);
    }

    #[test]
    fn test_snapshot_does_not_reset() {
        let metrics = Metrics::new();
        metrics.record_snapshot_evaluated(150);
        let _ = metrics.report();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.snapshots_evaluated, 1);
        assert_eq!(snapshot.eval_buckets[1], 1);
        assert_eq!(snapshot.eval_latency_sum_us, 150);
        assert_eq!(metrics.snapshot().eval_buckets[1], 1);
    }

    #[test]
    fn test_open_requests() {
        let metrics = Metrics::new();
        metrics.record_request_submitted();
        metrics.record_request_submitted();
        metrics.record_request_resolved();
        assert_eq!(metrics.report().open_requests, 1);
    }

    #[test]
    fn test_headcount_state_gauges() {
        let metrics = Metrics::new();
        metrics.set_headcount_state(2, 1, 1);
        metrics.set_confirmed_total(177);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.phase, 2);
        assert_eq!(snapshot.discrepant_zones, 1);
        assert_eq!(snapshot.ignored_counters, 1);
        assert_eq!(snapshot.confirmed_total, 177);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(Metrics::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for i in 0..1000 {
                    m.record_snapshot_evaluated(i as u64);
                    m.record_entry_submitted();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.entries_submitted(), 10_000);
        assert_eq!(metrics.snapshot().snapshots_evaluated, 10_000);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(51200), 9);
        assert_eq!(bucket_index(51201), 10);
    }

    #[test]
    fn test_percentile_computation() {
        let metrics = Metrics::new();
        for _ in 0..100 {
            metrics.record_snapshot_evaluated(150);
        }
        let summary = metrics.report();
        assert_eq!(summary.eval_p99_us, 200);
    }
}
