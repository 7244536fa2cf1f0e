//! Wall-clock source and service-day resolution
//!
//! The store stamps records with `Clock::now()`, and the binary resolves the
//! current service once at start-up. Tests drive a `ManualClock` instead of
//! the system clock so timestamps are deterministic.

use crate::domain::headcount::{ServiceDate, ServiceId};
use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use parking_lot::Mutex;

/// Source of "now"
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// The service a session works against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentService {
    pub id: ServiceId,
    pub date: ServiceDate,
}

/// Maps wall-clock time to the local service day
#[derive(Debug, Clone)]
pub struct ServiceResolver {
    offset: FixedOffset,
    service_override: Option<String>,
}

impl ServiceResolver {
    /// Offsets outside +/-24h fall back to UTC
    pub fn new(utc_offset_minutes: i32, service_override: Option<String>) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix());
        let service_override = service_override.filter(|id| !id.trim().is_empty());
        Self { offset, service_override }
    }

    /// Local calendar day at `now`
    pub fn service_date(&self, now: DateTime<Utc>) -> ServiceDate {
        ServiceDate(now.with_timezone(&self.offset).date_naive())
    }

    /// Resolve the current service; an override id keeps the day's date
    pub fn resolve(&self, clock: &dyn Clock) -> CurrentService {
        let date = self.service_date(clock.now());
        let id = match &self.service_override {
            Some(id) => ServiceId::new(id.trim()),
            None => ServiceId::for_date(date),
        };
        CurrentService { id, date }
    }
}
