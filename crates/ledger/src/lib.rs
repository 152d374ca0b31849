//! External collaborator interfaces for the liquidation monitor.
//!
//! The pipeline never talks to the privacy-preserving ledger or the market-data
//! provider directly. Everything goes through four narrow traits:
//!
//! - [`PriceSource`]: batch market-price fetch for tracked symbols
//! - [`OracleWriter`]: read/write the on-chain oracle price record
//! - [`NoteProvider`]: private-state resync and note decryption for an escrow
//! - [`TxExecutor`]: signed liquidation transaction submission
//!
//! Production adapters (an upstream price service over HTTP, a real ledger node
//! client) implement the same traits as the in-memory mocks, so the pipeline is
//! swappable without touching core code.

mod error;
mod http_source;
pub mod mock;
mod traits;
mod types;

pub use error::LedgerError;
pub use http_source::HttpPriceSource;
pub use traits::{NoteProvider, OracleWriter, PriceSource, TxExecutor};
pub use types::{LiquidationRequest, Note, TxReceipt};

/// Convenience alias used by all collaborator traits.
pub type LedgerResult<T> = Result<T, LedgerError>;
