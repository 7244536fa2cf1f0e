//! Domain models - the shared vocabulary of the welcome team
//!
//! - `zone` - counted zones and per-zone tallies
//! - `headcount` - counter identity, entries, discrepancies, confirmed counts
//! - `seat` - seating layout and seat occupancy records
//! - `request` - in-seat assistance requests
//! - `error` - error taxonomy shared by services and the store

pub mod error;
pub mod headcount;
pub mod request;
pub mod seat;
pub mod zone;

pub use error::{StoreError, WelcomeError, WelcomeResult};
pub use headcount::{
    ConfirmedCount, CounterName, EntryId, HeadcountDiscrepancy, HeadcountEntry, NewConfirmedCount,
    ServiceDate, ServiceId, DISCREPANCY_THRESHOLD,
};
pub use zone::{RawZoneCounts, ZoneCounts, ZoneName};
