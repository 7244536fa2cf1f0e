//! Real-time store interface
//!
//! The store is an external collaborator with two kinds of primitives:
//! writes, and subscriptions that push the full current snapshot of a
//! collection whenever it changes. Snapshots travel over `tokio::sync::watch`,
//! so a slow reader only ever sees the latest state and a repeated delivery
//! is harmless.

use crate::domain::error::StoreError;
use crate::domain::headcount::{ConfirmedCount, CounterName, HeadcountEntry, NewConfirmedCount, ServiceId};
use crate::domain::request::{NewRequest, RequestId, ServiceRequest};
use crate::domain::seat::{Seat, SeatId};
use crate::domain::zone::ZoneCounts;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// What a subscription carries: the current snapshot, or the error that ended delivery
pub type SnapshotResult<T> = Result<Arc<T>, StoreError>;

/// Live view of one collection; dropping it unsubscribes
pub struct Subscription<T> {
    rx: watch::Receiver<SnapshotResult<T>>,
}

impl<T> Subscription<T> {
    pub fn new(rx: watch::Receiver<SnapshotResult<T>>) -> Self {
        Self { rx }
    }

    /// Latest delivered snapshot (marks it as seen)
    pub fn latest(&mut self) -> SnapshotResult<T> {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next delivery; returns false once the store has gone away
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Primitives the welcome-team services need from the store
///
/// Writes are serialized by the store, and every timestamp in a returned
/// record is assigned by the store at write time.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// All entries for a service, in insertion order
    fn subscribe_entries(&self, service: &ServiceId) -> Result<Subscription<Vec<HeadcountEntry>>, StoreError>;

    /// Append a validated entry
    async fn add_entry(
        &self,
        service: &ServiceId,
        counter_name: &CounterName,
        counts: &ZoneCounts,
    ) -> Result<HeadcountEntry, StoreError>;

    /// Confirmed counts, most recent first, at most `limit`
    fn subscribe_confirmed(
        &self,
        service: &ServiceId,
        limit: usize,
    ) -> Result<Subscription<Vec<ConfirmedCount>>, StoreError>;

    /// Create-if-absent keyed by date; `StoreError::Conflict` when the date exists
    async fn create_confirmed(
        &self,
        service: &ServiceId,
        record: NewConfirmedCount,
    ) -> Result<ConfirmedCount, StoreError>;

    /// Seats that have ever been written for a service
    fn subscribe_seats(&self, service: &ServiceId) -> Result<Subscription<Vec<Seat>>, StoreError>;

    /// Upsert a seat's occupancy
    async fn put_seat(&self, service: &ServiceId, seat: SeatId, occupied: bool) -> Result<Seat, StoreError>;

    fn subscribe_requests(&self, service: &ServiceId) -> Result<Subscription<Vec<ServiceRequest>>, StoreError>;

    async fn add_request(&self, service: &ServiceId, request: NewRequest) -> Result<ServiceRequest, StoreError>;

    /// Mark a request resolved; `StoreError::NotFound` for unknown ids
    async fn resolve_request(&self, service: &ServiceId, id: &RequestId) -> Result<ServiceRequest, StoreError>;
}
