//! IO modules - external system interfaces
//!
//! - `console` - Operator command parsing and text rendering
//! - `store` - Real-time store trait and subscriptions
//! - `memory_store` - In-process store implementation
//! - `journal` - Confirmed counts output to file (JSONL format)
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod console;
pub mod journal;
pub mod memory_store;
pub mod prometheus;
pub mod store;

pub use journal::Journal;
pub use memory_store::InMemoryStore;
pub use store::{RealtimeStore, SnapshotResult, Subscription};
