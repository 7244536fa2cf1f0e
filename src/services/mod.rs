//! Services - business rules and workflows
//!
//! - `validation` - Submission validation and totals
//! - `reconcile` - Discrepancy detection, confirmation gate, merge
//! - `pairing` - Counter pair selection and workflow phase
//! - `headcount` - Submit / confirm workflow and the derived view
//! - `headcount_monitor` - Task keeping the live view current
//! - `seats` - Seat occupancy rules and writes
//! - `requests` - Assistance request rules and writes

pub mod headcount;
pub mod headcount_monitor;
pub mod pairing;
pub mod reconcile;
pub mod requests;
pub mod seats;
pub mod validation;

pub use headcount::{HeadcountService, HeadcountView, SubmitOutcome};
pub use headcount_monitor::{create_headcount_monitor, HeadcountMonitor, LiveHeadcount};
pub use pairing::{select_counter_pair, CounterPair, HeadcountPhase};
pub use reconcile::{can_confirm, find_discrepancies, merge_confirmed_counts};
pub use requests::RequestService;
pub use seats::SeatService;
pub use validation::{calculate_total, validate_headcount};
