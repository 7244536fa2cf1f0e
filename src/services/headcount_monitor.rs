//! Headcount monitor - keeps the live view in step with the store
//!
//! Watches the entry and confirmed-count subscriptions for one service and
//! recomputes the `HeadcountView` from scratch on every delivery, so a
//! duplicate or reordered delivery cannot leave stale state behind. The
//! result is published on a watch channel for the console and anything
//! else that wants the current picture.

use crate::domain::error::StoreError;
use crate::domain::headcount::{ConfirmedCount, HeadcountEntry, ServiceDate, ServiceId};
use crate::infra::clock::CurrentService;
use crate::infra::metrics::Metrics;
use crate::io::store::{RealtimeStore, Subscription};
use crate::services::headcount::HeadcountView;
use crate::services::pairing::HeadcountPhase;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What the monitor publishes
#[derive(Debug, Clone)]
pub struct LiveHeadcount {
    /// Last successfully evaluated view
    pub view: HeadcountView,
    /// Set while a subscription is delivering errors; cleared on recovery
    pub store_error: Option<StoreError>,
}

/// Task that re-evaluates the headcount view on every store change
pub struct HeadcountMonitor {
    service: ServiceId,
    date: ServiceDate,
    entries: Subscription<Vec<HeadcountEntry>>,
    confirmed: Subscription<Vec<ConfirmedCount>>,
    view_tx: watch::Sender<Arc<LiveHeadcount>>,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
    last_phase: Option<HeadcountPhase>,
    last_ignored: usize,
}

impl HeadcountMonitor {
    /// Run until shutdown or until the store drops its subscriptions
    pub async fn run(mut self) {
        info!(service = %self.service, date = %self.date, "headcount_monitor_started");
        self.refresh();

        loop {
            let keep_running = tokio::select! {
                alive = self.entries.changed() => alive,
                alive = self.confirmed.changed() => alive,
                res = self.shutdown.changed() => res.is_ok() && !*self.shutdown.borrow(),
            };
            if !keep_running {
                break;
            }
            self.refresh();
        }

        info!(service = %self.service, "headcount_monitor_stopped");
    }

    fn refresh(&mut self) {
        let start = Instant::now();
        // Read both so each delivery is marked seen
        let (entries, confirmed) = match (self.entries.latest(), self.confirmed.latest()) {
            (Ok(entries), Ok(confirmed)) => (entries, confirmed),
            (Err(e), _) | (_, Err(e)) => {
                self.publish_error(e);
                return;
            }
        };

        let view = HeadcountView::evaluate(&entries, &confirmed, self.date);
        let latency_us = start.elapsed().as_micros() as u64;

        self.metrics.record_snapshot_evaluated(latency_us);
        self.metrics.set_headcount_state(
            view.phase.code(),
            view.discrepancies.len() as u64,
            view.ignored_counters.len() as u64,
        );
        self.metrics.set_confirmed_total(view.confirmed.as_ref().map_or(0, |c| c.total()));

        if self.last_phase != Some(view.phase) {
            info!(
                service = %self.service,
                phase = %view.phase.as_str(),
                entries = %view.entry_count,
                discrepant_zones = %view.discrepancies.len(),
                "headcount_phase_changed"
            );
            self.last_phase = Some(view.phase);
        }
        if view.ignored_counters.len() > self.last_ignored {
            let ignored: Vec<&str> = view.ignored_counters.iter().map(|n| n.as_str()).collect();
            warn!(service = %self.service, ignored = %ignored.join(", "), "extra_counters_ignored");
        }
        self.last_ignored = view.ignored_counters.len();

        debug!(service = %self.service, latency_us = %latency_us, "headcount_evaluated");
        self.view_tx.send_replace(Arc::new(LiveHeadcount { view, store_error: None }));
    }

    fn publish_error(&mut self, e: StoreError) {
        self.metrics.record_store_error();
        warn!(service = %self.service, error = %e, "headcount_subscription_error");
        self.view_tx.send_modify(|live| {
            let mut next = (**live).clone();
            next.store_error = Some(e);
            *live = Arc::new(next);
        });
    }
}

/// Subscribe to the service's collections and build the monitor
///
/// Returns the view receiver and the monitor (to be spawned)
pub fn create_headcount_monitor(
    store: &dyn RealtimeStore,
    current: &CurrentService,
    history_limit: usize,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
) -> Result<(watch::Receiver<Arc<LiveHeadcount>>, HeadcountMonitor), StoreError> {
    let entries = store.subscribe_entries(&current.id)?;
    let confirmed = store.subscribe_confirmed(&current.id, history_limit)?;
    let initial = LiveHeadcount { view: HeadcountView::empty(current.date), store_error: None };
    let (view_tx, view_rx) = watch::channel(Arc::new(initial));

    let monitor = HeadcountMonitor {
        service: current.id.clone(),
        date: current.date,
        entries,
        confirmed,
        view_tx,
        metrics,
        shutdown,
        last_phase: None,
        last_ignored: 0,
    };
    Ok((view_rx, monitor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::zone::RawZoneCounts;
    use crate::infra::clock::ManualClock;
    use crate::io::memory_store::InMemoryStore;
    use crate::services::headcount::HeadcountService;
    use crate::services::reconcile::fixtures::at;
    use std::time::Duration;

    fn current() -> CurrentService {
        let date: ServiceDate = "2026-10-18".parse().unwrap();
        CurrentService { id: ServiceId::for_date(date), date }
    }

    fn raw(left: f64) -> RawZoneCounts {
        RawZoneCounts { left, middle: 80.0, right: 40.0, production: 5.0, outside: 2.0 }
    }

    /// Wait until the published view satisfies `pred`
    async fn wait_for(
        rx: &mut watch::Receiver<Arc<LiveHeadcount>>,
        pred: impl Fn(&LiveHeadcount) -> bool,
    ) -> Arc<LiveHeadcount> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let live = rx.borrow_and_update().clone();
                if pred(&live) {
                    return live;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_monitor_follows_workflow() {
        let store = Arc::new(InMemoryStore::new(Arc::new(ManualClock::new(at(0)))));
        let metrics = Arc::new(Metrics::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (mut rx, monitor) =
            create_headcount_monitor(store.as_ref(), &current(), 3, metrics.clone(), shutdown_rx).unwrap();
        let handle = tokio::spawn(monitor.run());

        let svc = HeadcountService::new(store.clone(), metrics.clone());
        let id = current().id;

        svc.submit_entry(&id, "Sam", raw(50.0)).await.unwrap();
        wait_for(&mut rx, |l| l.view.phase == HeadcountPhase::OneSubmitted).await;

        svc.submit_entry(&id, "Lee", raw(60.0)).await.unwrap();
        let live = wait_for(&mut rx, |l| l.view.entry_count == 2).await;
        assert_eq!(live.view.phase, HeadcountPhase::TwoSubmitted { discrepant: true });
        assert!(!live.view.can_confirm);

        svc.submit_entry(&id, "Lee", raw(52.0)).await.unwrap();
        let live = wait_for(&mut rx, |l| l.view.entry_count == 3).await;
        assert!(live.view.can_confirm);

        svc.confirm_current(&id, current().date).await.unwrap();
        let live = wait_for(&mut rx, |l| l.view.phase == HeadcountPhase::Confirmed).await;
        assert_eq!(live.view.confirmed.as_ref().unwrap().totals.left, 51);
        assert_eq!(metrics.phase(), HeadcountPhase::Confirmed.code());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_monitor_surfaces_store_errors() {
        let store = Arc::new(InMemoryStore::new(Arc::new(ManualClock::new(at(0)))));
        let metrics = Arc::new(Metrics::new());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (mut rx, monitor) =
            create_headcount_monitor(store.as_ref(), &current(), 3, metrics.clone(), shutdown_rx).unwrap();
        tokio::spawn(monitor.run());

        let svc = HeadcountService::new(store.clone(), metrics.clone());
        svc.submit_entry(&current().id, "Sam", raw(50.0)).await.unwrap();
        wait_for(&mut rx, |l| l.view.entry_count == 1).await;

        store.set_unreachable(true);
        let live = wait_for(&mut rx, |l| l.store_error.is_some()).await;
        // Last good view is kept while the store is away
        assert_eq!(live.view.entry_count, 1);

        store.set_unreachable(false);
        let live = wait_for(&mut rx, |l| l.store_error.is_none()).await;
        assert_eq!(live.view.phase, HeadcountPhase::OneSubmitted);
    }

    #[tokio::test]
    async fn test_monitor_stops_on_shutdown() {
        let store = InMemoryStore::new(Arc::new(ManualClock::new(at(0))));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_rx, monitor) =
            create_headcount_monitor(&store, &current(), 3, Arc::new(Metrics::new()), shutdown_rx).unwrap();
        let handle = tokio::spawn(monitor.run());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
