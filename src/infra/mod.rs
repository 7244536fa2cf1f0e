//! Infrastructure - configuration, time, and metrics
//!
//! - `config` - Application configuration (TOML loading, defaults)
//! - `clock` - Clock abstraction and service-day resolution
//! - `metrics` - Lock-free metrics collection

pub mod clock;
pub mod config;
pub mod metrics;

pub use clock::{Clock, CurrentService, ManualClock, ServiceResolver, SystemClock};
pub use config::Config;
pub use metrics::Metrics;
