//! Welcome team library
//!
//! Headcount reconciliation for two independent counters, seat occupancy
//! and in-seat assistance requests. Exposes modules for integration testing
//! and the console binary.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
