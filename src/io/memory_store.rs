//! In-process real-time store
//!
//! Holds every collection behind one `parking_lot::Mutex`, so writes are
//! serialized and each write publishes a fresh snapshot to its watch
//! channel before the lock is released. Timestamps come from the injected
//! clock and are forced strictly increasing across the whole store.
//!
//! `set_unreachable(true)` simulates a lost connection: writes and new
//! subscriptions fail with `StoreError::Unavailable`, and live subscriptions
//! receive the error. Reconnecting republishes current snapshots.

use crate::domain::error::StoreError;
use crate::domain::headcount::{
    new_uuid_v7, ConfirmedCount, CounterName, EntryId, HeadcountEntry, NewConfirmedCount, ServiceId,
};
use crate::domain::request::{NewRequest, RequestId, RequestStatus, ServiceRequest};
use crate::domain::seat::{Seat, SeatId};
use crate::domain::zone::ZoneCounts;
use crate::infra::clock::Clock;
use crate::io::store::{RealtimeStore, SnapshotResult, Subscription};
use crate::services::validation::calculate_total;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// One collection plus the channel its subscribers watch
struct Collection<T> {
    items: Vec<T>,
    tx: watch::Sender<SnapshotResult<Vec<T>>>,
}

impl<T: Clone> Collection<T> {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(Ok(Arc::new(Vec::new())));
        Self { items: Vec::new(), tx }
    }

    fn publish(&self) {
        self.tx.send_modify(|snapshot| *snapshot = Ok(Arc::new(self.items.clone())));
    }

    fn fail(&self, err: &StoreError) {
        self.tx.send_modify(|snapshot| *snapshot = Err(err.clone()));
    }

    fn subscribe(&self) -> Subscription<Vec<T>> {
        Subscription::new(self.tx.subscribe())
    }
}

/// Confirmed counts, most recent first, with one channel per window size
struct ConfirmedCollection {
    items: Vec<ConfirmedCount>,
    windows: HashMap<usize, watch::Sender<SnapshotResult<Vec<ConfirmedCount>>>>,
}

impl ConfirmedCollection {
    fn new() -> Self {
        Self { items: Vec::new(), windows: HashMap::new() }
    }

    fn window(&self, limit: usize) -> Arc<Vec<ConfirmedCount>> {
        Arc::new(self.items.iter().take(limit).cloned().collect())
    }

    fn publish(&mut self) {
        self.windows.retain(|_, tx| tx.receiver_count() > 0);
        for (&limit, tx) in &self.windows {
            let window = self.window(limit);
            tx.send_modify(|snapshot| *snapshot = Ok(window));
        }
    }

    fn fail(&self, err: &StoreError) {
        for tx in self.windows.values() {
            tx.send_modify(|snapshot| *snapshot = Err(err.clone()));
        }
    }

    fn subscribe(&mut self, limit: usize) -> Subscription<Vec<ConfirmedCount>> {
        let window = self.window(limit);
        let tx = self.windows.entry(limit).or_insert_with(|| watch::channel(Ok(window.clone())).0);
        Subscription::new(tx.subscribe())
    }
}

/// Everything stored for one service
struct ServiceState {
    entries: Collection<HeadcountEntry>,
    confirmed: ConfirmedCollection,
    /// Kept sorted by seat id
    seats: Collection<Seat>,
    requests: Collection<ServiceRequest>,
}

impl ServiceState {
    fn new() -> Self {
        Self {
            entries: Collection::new(),
            confirmed: ConfirmedCollection::new(),
            seats: Collection::new(),
            requests: Collection::new(),
        }
    }

    fn fail_all(&self, err: &StoreError) {
        self.entries.fail(err);
        self.confirmed.fail(err);
        self.seats.fail(err);
        self.requests.fail(err);
    }

    fn publish_all(&mut self) {
        self.entries.publish();
        self.confirmed.publish();
        self.seats.publish();
        self.requests.publish();
    }
}

struct StoreState {
    services: HashMap<ServiceId, ServiceState>,
    last_timestamp: Option<DateTime<Utc>>,
    /// Read and written under the lock so no write slips past a disconnect
    unreachable: bool,
}

impl StoreState {
    fn service(&mut self, service: &ServiceId) -> &mut ServiceState {
        self.services.entry(service.clone()).or_insert_with(ServiceState::new)
    }
}

/// Real-time store kept entirely in memory
pub struct InMemoryStore {
    clock: Arc<dyn Clock>,
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(StoreState { services: HashMap::new(), last_timestamp: None, unreachable: false }),
        }
    }

    /// Simulate losing or regaining the connection
    pub fn set_unreachable(&self, unreachable: bool) {
        let mut state = self.state.lock();
        if state.unreachable == unreachable {
            return;
        }

        state.unreachable = unreachable;
        if unreachable {
            let err = StoreError::Unavailable("connection lost".to_string());
            for service in state.services.values() {
                service.fail_all(&err);
            }
            warn!("store_unreachable");
        } else {
            for service in state.services.values_mut() {
                service.publish_all();
            }
            info!("store_reconnected");
        }
    }

    /// Lock the state, failing if the connection is down
    fn lock_reachable(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        let state = self.state.lock();
        if state.unreachable {
            return Err(StoreError::Unavailable("store is unreachable".to_string()));
        }
        Ok(state)
    }

    /// Next write timestamp, strictly after every earlier one
    fn stamp(&self, state: &mut StoreState) -> DateTime<Utc> {
        let mut now = self.clock.now();
        if let Some(last) = state.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        state.last_timestamp = Some(now);
        now
    }
}

#[async_trait]
impl RealtimeStore for InMemoryStore {
    fn subscribe_entries(&self, service: &ServiceId) -> Result<Subscription<Vec<HeadcountEntry>>, StoreError> {
        Ok(self.lock_reachable()?.service(service).entries.subscribe())
    }

    async fn add_entry(
        &self,
        service: &ServiceId,
        counter_name: &CounterName,
        counts: &ZoneCounts,
    ) -> Result<HeadcountEntry, StoreError> {
        let mut state = self.lock_reachable()?;
        let submitted_at = self.stamp(&mut state);
        let entry = HeadcountEntry {
            id: EntryId::generate(),
            counter_name: counter_name.clone(),
            counts: *counts,
            total: calculate_total(counts),
            submitted_at,
        };

        let entries = &mut state.service(service).entries;
        entries.items.push(entry.clone());
        entries.publish();
        debug!(service = %service, id = %entry.id, "store_entry_added");
        Ok(entry)
    }

    fn subscribe_confirmed(
        &self,
        service: &ServiceId,
        limit: usize,
    ) -> Result<Subscription<Vec<ConfirmedCount>>, StoreError> {
        Ok(self.lock_reachable()?.service(service).confirmed.subscribe(limit))
    }

    async fn create_confirmed(
        &self,
        service: &ServiceId,
        record: NewConfirmedCount,
    ) -> Result<ConfirmedCount, StoreError> {
        let mut state = self.lock_reachable()?;
        if state.service(service).confirmed.items.iter().any(|c| c.date == record.date) {
            return Err(StoreError::Conflict(format!("confirmed count for {} on {}", service, record.date)));
        }

        let confirmed_at = self.stamp(&mut state);
        let confirmed = ConfirmedCount {
            date: record.date,
            counter_a: record.counter_a,
            counter_b: record.counter_b,
            confirmed: true,
            totals: record.totals,
            confirmed_at,
        };

        let collection = &mut state.service(service).confirmed;
        collection.items.insert(0, confirmed.clone());
        collection.publish();
        debug!(service = %service, date = %confirmed.date, "store_confirmed_created");
        Ok(confirmed)
    }

    fn subscribe_seats(&self, service: &ServiceId) -> Result<Subscription<Vec<Seat>>, StoreError> {
        Ok(self.lock_reachable()?.service(service).seats.subscribe())
    }

    async fn put_seat(&self, service: &ServiceId, seat: SeatId, occupied: bool) -> Result<Seat, StoreError> {
        let mut state = self.lock_reachable()?;
        let updated_at = self.stamp(&mut state);
        let record = Seat { id: seat, occupied, updated_at: Some(updated_at) };

        let seats = &mut state.service(service).seats;
        match seats.items.binary_search_by_key(&seat, |s| s.id) {
            Ok(pos) => seats.items[pos] = record.clone(),
            Err(pos) => seats.items.insert(pos, record.clone()),
        }
        seats.publish();
        Ok(record)
    }

    fn subscribe_requests(&self, service: &ServiceId) -> Result<Subscription<Vec<ServiceRequest>>, StoreError> {
        Ok(self.lock_reachable()?.service(service).requests.subscribe())
    }

    async fn add_request(&self, service: &ServiceId, request: NewRequest) -> Result<ServiceRequest, StoreError> {
        let mut state = self.lock_reachable()?;
        let created_at = self.stamp(&mut state);
        let stored = ServiceRequest {
            id: RequestId(new_uuid_v7()),
            section: request.section,
            row: request.row,
            area_label: request.area_label,
            request_type: request.request_type,
            quantity: request.quantity,
            note: request.note,
            status: RequestStatus::Pending,
            created_at,
            resolved_at: None,
        };

        let requests = &mut state.service(service).requests;
        requests.items.push(stored.clone());
        requests.publish();
        Ok(stored)
    }

    async fn resolve_request(&self, service: &ServiceId, id: &RequestId) -> Result<ServiceRequest, StoreError> {
        let mut state = self.lock_reachable()?;
        let pos = state
            .service(service)
            .requests
            .items
            .iter()
            .position(|r| r.id == *id)
            .ok_or_else(|| StoreError::NotFound(format!("request {}", id)))?;
        if state.service(service).requests.items[pos].status == RequestStatus::Resolved {
            return Err(StoreError::Conflict(format!("request {} already resolved", id)));
        }

        let resolved_at = self.stamp(&mut state);
        let requests = &mut state.service(service).requests;
        let request = &mut requests.items[pos];
        request.status = RequestStatus::Resolved;
        request.resolved_at = Some(resolved_at);
        let resolved = request.clone();
        requests.publish();
        Ok(resolved)
    }
}
