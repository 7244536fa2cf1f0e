//! Seat occupancy rules and service
//!
//! The store only holds seats that have been touched; every other seat in
//! the layout is vacant. Summaries start from the full layout and subtract
//! occupied seats, while the simple counts look at stored seats only.

use crate::domain::error::{WelcomeError, WelcomeResult};
use crate::domain::headcount::ServiceId;
use crate::domain::seat::{Seat, SeatId, SeatSummary, SectionName, SECTIONS};
use crate::infra::metrics::Metrics;
use crate::io::store::{RealtimeStore, Subscription};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

/// Per-row availability for every row of every section, in layout order
pub fn compute_seat_summaries(seats: &[Seat]) -> Vec<SeatSummary> {
    let mut summaries: BTreeMap<(SectionName, u32), SeatSummary> = BTreeMap::new();
    for section in SECTIONS.iter() {
        for row in 1..=section.rows {
            let total_seats = section.seats_in_row(row).unwrap_or(0);
            summaries.insert(
                (section.name, row),
                SeatSummary {
                    section: section.name,
                    row,
                    total_seats,
                    available_seats: total_seats,
                    occupied_seats: 0,
                },
            );
        }
    }

    for seat in seats.iter().filter(|s| s.occupied) {
        if let Some(summary) = summaries.get_mut(&(seat.id.section, seat.id.row)) {
            summary.occupied_seats += 1;
            summary.available_seats = summary.available_seats.saturating_sub(1);
        }
    }

    summaries.into_values().collect()
}

/// Stored seats that are free
pub fn available_count(seats: &[Seat]) -> usize {
    seats.iter().filter(|s| !s.occupied).count()
}

pub fn occupied_count(seats: &[Seat]) -> usize {
    seats.iter().filter(|s| s.occupied).count()
}

/// Free stored seats per section
pub fn section_availability(seats: &[Seat]) -> BTreeMap<SectionName, usize> {
    let mut result: BTreeMap<SectionName, usize> = SectionName::ALL.into_iter().map(|s| (s, 0)).collect();
    for seat in seats.iter().filter(|s| !s.occupied) {
        *result.entry(seat.id.section).or_default() += 1;
    }
    result
}

/// Seat writes against the real-time store
pub struct SeatService {
    store: Arc<dyn RealtimeStore>,
    metrics: Arc<Metrics>,
}

impl SeatService {
    pub fn new(store: Arc<dyn RealtimeStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    pub fn subscribe_seats(&self, service: &ServiceId) -> WelcomeResult<Subscription<Vec<Seat>>> {
        Ok(self.store.subscribe_seats(service)?)
    }

    /// Set a seat's occupancy explicitly
    pub async fn set_seat(&self, service: &ServiceId, seat: SeatId, occupied: bool) -> WelcomeResult<Seat> {
        if !seat.is_in_layout() {
            return Err(WelcomeError::InvalidSeat(seat.to_string()));
        }

        let stored = self.store.put_seat(service, seat, occupied).await.map_err(|e| {
            self.metrics.record_store_error();
            error!(service = %service, seat = %seat, error = %e, "seat_update_failed");
            WelcomeError::from(e)
        })?;

        self.metrics.record_seat_update();
        info!(service = %service, seat = %seat, occupied = %occupied, "seat_updated");
        Ok(stored)
    }

    /// Flip a seat based on the state the caller last saw
    pub async fn toggle_seat(&self, service: &ServiceId, seat: &Seat) -> WelcomeResult<Seat> {
        self.set_seat(service, seat.id, !seat.occupied).await
    }
}
