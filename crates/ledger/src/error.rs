//! Error type for ledger and market-data collaborators.

use thiserror::Error;

/// Failures crossing the collaborator boundary.
///
/// The pipeline treats every variant as transient: the failure is logged and the
/// next scheduled tick retries from the same baseline. No variant is ever mapped
/// to an HTTP error for API callers.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Could not reach the remote endpoint (network, DNS, timeout).
    #[error("connection failure: {0}")]
    Connection(String),

    /// The endpoint answered but the payload was unusable.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The ledger accepted the request and rejected it (revert, insufficient
    /// collateral at execution time, stale nonce).
    #[error("rejected by ledger: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Connection(err.to_string())
        } else {
            Self::Protocol(err.to_string())
        }
    }
}
