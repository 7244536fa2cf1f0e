//! Headcount workflow: submit, evaluate, confirm
//!
//! `HeadcountView::evaluate` is the pure read side: from the full entry and
//! confirmed snapshots it derives the pair, discrepancies, gate decision and
//! phase. `HeadcountService` is the write side and talks to the store.
//!
//! Confirmation is gated twice: the service refuses a pair the gate rejects
//! before merging, and the store's create-if-absent write refuses a second
//! record for the same date.

use crate::domain::error::{StoreError, WelcomeError, WelcomeResult};
use crate::domain::headcount::{
    ConfirmedCount, CounterName, EntryId, HeadcountDiscrepancy, HeadcountEntry, NewConfirmedCount,
    ServiceDate, ServiceId,
};
use crate::domain::zone::{RawZoneCounts, ZoneCounts};
use crate::infra::metrics::Metrics;
use crate::io::journal::Journal;
use crate::io::store::RealtimeStore;
use crate::services::pairing::{select_counter_pair, HeadcountPhase};
use crate::services::reconcile::{can_confirm, find_discrepancies, merge_confirmed_counts};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a submission that reached validation
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted(EntryId),
    /// Nothing was stored; one message per problem
    Rejected(Vec<String>),
}

/// Everything the headcount screen shows, derived from one pair of snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadcountView {
    pub date: ServiceDate,
    pub entry_count: usize,
    pub counter_a: Option<HeadcountEntry>,
    pub counter_b: Option<HeadcountEntry>,
    pub ignored_counters: Vec<CounterName>,
    pub discrepancies: Vec<HeadcountDiscrepancy>,
    pub can_confirm: bool,
    pub phase: HeadcountPhase,
    /// Today's confirmed record, if any
    pub confirmed: Option<ConfirmedCount>,
    /// Recent confirmed counts, most recent first
    pub history: Vec<ConfirmedCount>,
}

impl HeadcountView {
    /// Recompute from scratch; same snapshots always give the same view
    pub fn evaluate(entries: &[HeadcountEntry], confirmed: &[ConfirmedCount], date: ServiceDate) -> Self {
        let pair = select_counter_pair(entries);
        let today = confirmed.iter().find(|c| c.date == date).cloned();
        let phase = HeadcountPhase::derive(&pair, today.is_some());
        // A confirmed day is terminal
        let confirmable = today.is_none() && can_confirm(pair.counter_a, pair.counter_b);

        Self {
            date,
            entry_count: entries.len(),
            counter_a: pair.counter_a.cloned(),
            counter_b: pair.counter_b.cloned(),
            ignored_counters: pair.ignored_counters.iter().map(|name| (*name).clone()).collect(),
            discrepancies: find_discrepancies(pair.counter_a, pair.counter_b),
            can_confirm: confirmable,
            phase,
            confirmed: today,
            history: confirmed.to_vec(),
        }
    }

    pub fn empty(date: ServiceDate) -> Self {
        Self::evaluate(&[], &[], date)
    }

    /// The tally a confirmation would store right now; None once confirmed
    pub fn merged_preview(&self) -> Option<ZoneCounts> {
        if self.phase == HeadcountPhase::Confirmed {
            return None;
        }
        match (&self.counter_a, &self.counter_b) {
            (Some(a), Some(b)) if self.can_confirm => merge_confirmed_counts(a, b).ok(),
            _ => None,
        }
    }
}

/// Submission and confirmation against the real-time store
pub struct HeadcountService {
    store: Arc<dyn RealtimeStore>,
    metrics: Arc<Metrics>,
    journal: Option<Journal>,
}

impl HeadcountService {
    pub fn new(store: Arc<dyn RealtimeStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics, journal: None }
    }

    /// Also append every confirmation to a JSONL journal
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    fn store_failed(&self, operation: &'static str, service: &ServiceId, e: StoreError) -> WelcomeError {
        self.metrics.record_store_error();
        error!(operation = %operation, service = %service, error = %e, "store_operation_failed");
        WelcomeError::Store(e)
    }

    /// Validate and store one counter's tally
    ///
    /// Validation failures come back as `SubmitOutcome::Rejected`; only a
    /// blank name or a store failure is an `Err`.
    pub async fn submit_entry(
        &self,
        service: &ServiceId,
        counter_name: &str,
        raw: RawZoneCounts,
    ) -> WelcomeResult<SubmitOutcome> {
        let name = CounterName::parse(counter_name).ok_or(WelcomeError::InvalidCounterName)?;

        let counts = match ZoneCounts::try_from(raw) {
            Ok(counts) => counts,
            Err(errors) => {
                self.metrics.record_submission_rejected();
                warn!(service = %service, counter = %name, errors = %errors.join("; "), "entry_rejected");
                return Ok(SubmitOutcome::Rejected(errors));
            }
        };

        let entry = self
            .store
            .add_entry(service, &name, &counts)
            .await
            .map_err(|e| self.store_failed("add_entry", service, e))?;

        self.metrics.record_entry_submitted();
        info!(
            service = %service,
            counter = %entry.counter_name,
            id = %entry.id,
            total = %entry.total,
            "entry_submitted"
        );
        Ok(SubmitOutcome::Accepted(entry.id))
    }

    /// Gate, merge and persist the confirmed count for `date`
    pub async fn confirm_entries(
        &self,
        service: &ServiceId,
        date: ServiceDate,
        entry_a: Option<&HeadcountEntry>,
        entry_b: Option<&HeadcountEntry>,
    ) -> WelcomeResult<ConfirmedCount> {
        let (a, b) = match (entry_a, entry_b) {
            (Some(a), Some(b)) if can_confirm(entry_a, entry_b) => (a, b),
            (Some(a), Some(b)) => {
                self.metrics.record_precondition_violation();
                let zones: Vec<&str> =
                    find_discrepancies(entry_a, entry_b).iter().map(|d| d.zone.as_str()).collect();
                warn!(service = %service, date = %date, zones = %zones.join(", "), "confirm_discrepant_pair");
                return Err(WelcomeError::PreconditionViolation(format!(
                    "{} and {} disagree on {}",
                    a.counter_name,
                    b.counter_name,
                    zones.join(", ")
                )));
            }
            _ => {
                self.metrics.record_precondition_violation();
                warn!(service = %service, date = %date, "confirm_without_pair");
                return Err(WelcomeError::PreconditionViolation(
                    "both counters must submit before confirming".to_string(),
                ));
            }
        };

        // Merge re-checks the pair and fails rather than averaging a discrepancy
        let totals = merge_confirmed_counts(a, b)?;

        let record = NewConfirmedCount { date, counter_a: a.clone(), counter_b: b.clone(), totals };
        let confirmed = match self.store.create_confirmed(service, record).await {
            Ok(confirmed) => confirmed,
            Err(StoreError::Conflict(_)) => {
                self.metrics.record_confirmation_conflict();
                warn!(service = %service, date = %date, "headcount_already_confirmed");
                return Err(WelcomeError::AlreadyConfirmed { service: service.clone(), date });
            }
            Err(e) => return Err(self.store_failed("create_confirmed", service, e)),
        };

        self.metrics.record_confirmation();
        self.metrics.set_confirmed_total(confirmed.total());
        info!(
            service = %service,
            date = %date,
            counter_a = %a.counter_name,
            counter_b = %b.counter_name,
            total = %confirmed.total(),
            "headcount_confirmed"
        );

        if let Some(journal) = &self.journal {
            if !journal.write_confirmed(service, &confirmed) {
                self.metrics.record_journal_failure();
            }
        }

        Ok(confirmed)
    }

    /// Confirm whatever pair the latest entry snapshot selects
    pub async fn confirm_current(&self, service: &ServiceId, date: ServiceDate) -> WelcomeResult<ConfirmedCount> {
        let entries = self
            .store
            .subscribe_entries(service)
            .and_then(|mut sub| sub.latest())
            .map_err(|e| self.store_failed("subscribe_entries", service, e))?;

        let pair = select_counter_pair(&entries);
        if !pair.ignored_counters.is_empty() {
            let ignored: Vec<&str> = pair.ignored_counters.iter().map(|n| n.as_str()).collect();
            warn!(service = %service, ignored = %ignored.join(", "), "extra_counters_ignored");
        }
        self.confirm_entries(service, date, pair.counter_a, pair.counter_b).await
    }

    /// One-off evaluation of the current snapshots
    pub fn current_view(
        &self,
        service: &ServiceId,
        date: ServiceDate,
        history_limit: usize,
    ) -> WelcomeResult<HeadcountView> {
        let entries = self
            .store
            .subscribe_entries(service)
            .and_then(|mut sub| sub.latest())
            .map_err(|e| self.store_failed("subscribe_entries", service, e))?;
        let confirmed = self
            .store
            .subscribe_confirmed(service, history_limit)
            .and_then(|mut sub| sub.latest())
            .map_err(|e| self.store_failed("subscribe_confirmed", service, e))?;
        Ok(HeadcountView::evaluate(&entries, &confirmed, date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::zone::ZoneName;
    use crate::infra::clock::ManualClock;
    use crate::io::memory_store::InMemoryStore;
    use crate::services::reconcile::fixtures::{at, entry};
    use tempfile::tempdir;

    fn date() -> ServiceDate {
        "2026-10-18".parse().unwrap()
    }

    fn service() -> ServiceId {
        ServiceId::for_date(date())
    }

    fn raw(left: f64) -> RawZoneCounts {
        RawZoneCounts { left, middle: 80.0, right: 40.0, production: 5.0, outside: 2.0 }
    }

    fn setup() -> (Arc<InMemoryStore>, Arc<Metrics>, HeadcountService) {
        let store = Arc::new(InMemoryStore::new(Arc::new(ManualClock::new(at(0)))));
        let metrics = Arc::new(Metrics::new());
        let service = HeadcountService::new(store.clone(), metrics.clone());
        (store, metrics, service)
    }

    #[test]
    fn test_view_phases() {
        let counts = ZoneCounts::new(50, 80, 40, 5, 2);
        let a = entry("Sam", counts, 1);
        let b = entry("Lee", counts.with(ZoneName::Left, 60), 2);

        assert_eq!(HeadcountView::empty(date()).phase, HeadcountPhase::NoEntries);

        let view = HeadcountView::evaluate(&[a.clone()], &[], date());
        assert_eq!(view.phase, HeadcountPhase::OneSubmitted);
        assert!(!view.can_confirm);
        assert!(view.merged_preview().is_none());

        let view = HeadcountView::evaluate(&[a.clone(), b.clone()], &[], date());
        assert_eq!(view.phase, HeadcountPhase::TwoSubmitted { discrepant: true });
        assert_eq!(view.discrepancies.len(), 1);
        assert!(view.merged_preview().is_none());
    }

    #[test]
    fn test_view_is_idempotent() {
        let counts = ZoneCounts::new(50, 80, 40, 5, 2);
        let entries = vec![entry("Sam", counts, 1), entry("Lee", counts.with(ZoneName::Left, 53), 2)];
        let first = HeadcountView::evaluate(&entries, &[], date());
        let second = HeadcountView::evaluate(&entries, &[], date());
        assert_eq!(first, second);
        assert_eq!(first.merged_preview().unwrap().left, 52);
    }

    #[test]
    fn test_other_days_do_not_confirm_today() {
        let counts = ZoneCounts::new(50, 80, 40, 5, 2);
        let last_week = ConfirmedCount {
            date: "2026-10-11".parse().unwrap(),
            counter_a: entry("Sam", counts, 1),
            counter_b: entry("Lee", counts, 2),
            confirmed: true,
            totals: counts,
            confirmed_at: at(3),
        };
        let view = HeadcountView::evaluate(&[], &[last_week], date());
        assert_eq!(view.phase, HeadcountPhase::NoEntries);
        assert!(view.confirmed.is_none());
        assert_eq!(view.history.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_accepts_valid_entry() {
        let (_store, metrics, svc) = setup();
        let outcome = svc.submit_entry(&service(), "  Sam ", raw(50.0)).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted(_)));
        assert_eq!(metrics.entries_submitted(), 1);

        let view = svc.current_view(&service(), date(), 3).unwrap();
        assert_eq!(view.counter_a.unwrap().counter_name.as_str(), "Sam");
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_counts() {
        let (_store, metrics, svc) = setup();
        let bad = RawZoneCounts { left: -1.0, middle: 3.5, right: 0.0, production: 0.0, outside: 0.0 };
        let outcome = svc.submit_entry(&service(), "Sam", bad).await.unwrap();
        let SubmitOutcome::Rejected(errors) = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(metrics.entries_submitted(), 0);
        assert_eq!(svc.current_view(&service(), date(), 3).unwrap().entry_count, 0);
    }

    #[tokio::test]
    async fn test_submit_requires_name() {
        let (_store, _metrics, svc) = setup();
        let err = svc.submit_entry(&service(), "   ", raw(50.0)).await.unwrap_err();
        assert_eq!(err, WelcomeError::InvalidCounterName);
    }

    #[tokio::test]
    async fn test_confirm_current_merges_and_persists() {
        let (_store, metrics, svc) = setup();
        svc.submit_entry(&service(), "Sam", raw(50.0)).await.unwrap();
        svc.submit_entry(&service(), "Lee", raw(53.0)).await.unwrap();

        let confirmed = svc.confirm_current(&service(), date()).await.unwrap();
        assert!(confirmed.confirmed);
        assert_eq!(confirmed.totals, ZoneCounts::new(52, 80, 40, 5, 2));
        assert_eq!(confirmed.counter_a.counter_name.as_str(), "Sam");
        assert_eq!(metrics.confirmations(), 1);

        let view = svc.current_view(&service(), date(), 3).unwrap();
        assert_eq!(view.phase, HeadcountPhase::Confirmed);
        assert_eq!(view.confirmed.unwrap().totals.left, 52);
    }

    #[tokio::test]
    async fn test_confirm_refuses_discrepant_pair() {
        let (_store, metrics, svc) = setup();
        svc.submit_entry(&service(), "Sam", raw(50.0)).await.unwrap();
        svc.submit_entry(&service(), "Lee", raw(60.0)).await.unwrap();

        let err = svc.confirm_current(&service(), date()).await.unwrap_err();
        assert!(matches!(err, WelcomeError::PreconditionViolation(_)));
        assert_eq!(metrics.confirmations(), 0);
        assert!(svc.current_view(&service(), date(), 3).unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn test_confirm_refuses_missing_counter() {
        let (_store, _metrics, svc) = setup();
        svc.submit_entry(&service(), "Sam", raw(50.0)).await.unwrap();
        let err = svc.confirm_current(&service(), date()).await.unwrap_err();
        assert!(matches!(err, WelcomeError::PreconditionViolation(_)));
    }

    #[tokio::test]
    async fn test_second_confirmation_is_rejected() {
        let (_store, metrics, svc) = setup();
        svc.submit_entry(&service(), "Sam", raw(50.0)).await.unwrap();
        svc.submit_entry(&service(), "Lee", raw(50.0)).await.unwrap();
        let first = svc.confirm_current(&service(), date()).await.unwrap();

        svc.submit_entry(&service(), "Lee", raw(54.0)).await.unwrap();
        let err = svc.confirm_current(&service(), date()).await.unwrap_err();
        assert_eq!(err, WelcomeError::AlreadyConfirmed { service: service(), date: date() });
        assert_eq!(metrics.confirmation_conflicts(), 1);

        let view = svc.current_view(&service(), date(), 3).unwrap();
        assert_eq!(view.history.len(), 1);
        assert_eq!(view.confirmed.unwrap(), first);
    }

    #[tokio::test]
    async fn test_store_outage_is_transient() {
        let (store, metrics, svc) = setup();
        store.set_unreachable(true);
        let err = svc.submit_entry(&service(), "Sam", raw(50.0)).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(metrics.store_errors(), 1);

        store.set_unreachable(false);
        let outcome = svc.submit_entry(&service(), "Sam", raw(50.0)).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted(_)));
    }

    #[tokio::test]
    async fn test_confirmation_is_journaled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("confirmed.jsonl");
        let store = Arc::new(InMemoryStore::new(Arc::new(ManualClock::new(at(0)))));
        let svc = HeadcountService::new(store, Arc::new(Metrics::new())).with_journal(Journal::new(&path));

        svc.submit_entry(&service(), "Sam", raw(50.0)).await.unwrap();
        svc.submit_entry(&service(), "Lee", raw(50.0)).await.unwrap();
        svc.confirm_current(&service(), date()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("\"total\":177"));
    }

    #[tokio::test]
    async fn test_journal_failure_keeps_confirmation() {
        let dir = tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new(Arc::new(ManualClock::new(at(0)))));
        let metrics = Arc::new(Metrics::new());
        // A directory cannot be opened for append
        let svc = HeadcountService::new(store, metrics.clone()).with_journal(Journal::new(dir.path()));

        svc.submit_entry(&service(), "Sam", raw(50.0)).await.unwrap();
        svc.submit_entry(&service(), "Lee", raw(50.0)).await.unwrap();
        let confirmed = svc.confirm_current(&service(), date()).await.unwrap();

        let view = svc.current_view(&service(), date(), 3).unwrap();
        assert_eq!(view.confirmed, Some(confirmed));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.confirmations, 1);
        assert_eq!(snapshot.journal_failures, 1);
    }

    #[tokio::test]
    async fn test_confirmed_view_is_terminal() {
        let (_store, _metrics, svc) = setup();
        svc.submit_entry(&service(), "Sam", raw(50.0)).await.unwrap();
        svc.submit_entry(&service(), "Lee", raw(50.0)).await.unwrap();
        assert!(svc.current_view(&service(), date(), 3).unwrap().merged_preview().is_some());

        svc.confirm_current(&service(), date()).await.unwrap();
        let view = svc.current_view(&service(), date(), 3).unwrap();
        assert_eq!(view.phase, HeadcountPhase::Confirmed);
        assert!(!view.can_confirm);
        assert!(view.merged_preview().is_none());
    }

    #[tokio::test]
    async fn test_confirm_entries_gates_before_merging() {
        let (_store, metrics, svc) = setup();
        let counts = ZoneCounts::new(50, 80, 40, 5, 2);
        let a = entry("Sam", counts, 1);
        let b = entry("Lee", counts.with(ZoneName::Left, 60), 2);

        let err = svc.confirm_entries(&service(), date(), Some(&a), Some(&b)).await.unwrap_err();
        assert!(matches!(err, WelcomeError::PreconditionViolation(ref msg) if msg.contains("left")));
        let err = svc.confirm_entries(&service(), date(), Some(&a), None).await.unwrap_err();
        assert!(matches!(err, WelcomeError::PreconditionViolation(_)));

        assert_eq!(metrics.snapshot().precondition_violations, 2);
        assert!(svc.current_view(&service(), date(), 3).unwrap().history.is_empty());
    }
}
