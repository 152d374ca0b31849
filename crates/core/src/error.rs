//! Error taxonomy for the monitor pipeline and its HTTP surface.

use thiserror::Error;

use monitor_ledger::LedgerError;

/// Pipeline error taxonomy.
///
/// The first four variants map directly onto HTTP statuses (400/409/404/401).
/// `Transient` failures never reach an API caller as the primary cause; they are
/// logged and the next scheduled tick retries. Anything unexpected becomes
/// `Internal` and surfaces as a generic 500.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Malformed address, asset or request body.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Duplicate registration.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unknown escrow or position.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or invalid API key.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Price source, ledger read/write or tx submission failure.
    #[error("transient I/O failure: {0}")]
    Transient(#[from] LedgerError),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
}
