//! Error taxonomy
//!
//! Validation problems are not errors here: they are returned as a list of
//! messages so the caller can show them next to the inputs. These enums
//! cover everything that makes an attempt fail outright.

use crate::domain::headcount::{ServiceDate, ServiceId};

/// Failures reported by the real-time store collaborator
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store unreachable or the write was not acknowledged (transient)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Create-if-absent write found an existing record
    #[error("record already exists: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Transient errors the user may retry by hand
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Failures of a submission, confirmation, seat or request operation
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WelcomeError {
    /// Merge or confirm invoked without a confirmable pair (logic error)
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// The service day already has a confirmed count
    #[error("headcount for {service} on {date} is already confirmed")]
    AlreadyConfirmed { service: ServiceId, date: ServiceDate },

    #[error("counter name cannot be empty")]
    InvalidCounterName,

    #[error("invalid seat: {0}")]
    InvalidSeat(String),

    /// Request rejected before reaching the store; one message per problem
    #[error("invalid request: {}", .0.join("; "))]
    InvalidRequest(Vec<String>),

    #[error("request {0} not found")]
    RequestNotFound(String),

    #[error("request {0} is already resolved")]
    RequestAlreadyResolved(String),

    /// Store failure, usually connectivity
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WelcomeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, WelcomeError::Store(e) if e.is_transient())
    }
}

pub type WelcomeResult<T> = Result<T, WelcomeError>;
