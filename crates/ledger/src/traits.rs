//! Collaborator traits abstracting the ledger and the market-data provider.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::types::{LiquidationRequest, Note, TxReceipt};
use crate::LedgerResult;

/// Batch market-price feed for tracked symbols.
///
/// The batch is atomic from the caller's perspective: an `Err` means no price in
/// the response may be applied.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current USD price for every requested symbol.
    async fn fetch_prices(&self, symbols: &[String]) -> LedgerResult<HashMap<String, f64>>;
}

/// Read/write access to the on-chain oracle price record.
#[async_trait]
pub trait OracleWriter: Send + Sync {
    /// Push a new price on-chain and await confirmation.
    async fn update_price(&self, symbol: &str, price: f64) -> LedgerResult<()>;

    /// Read the current on-chain price, if one has ever been written.
    async fn get_price(&self, symbol: &str) -> LedgerResult<Option<f64>>;
}

/// Private-state synchronization and note access for escrow accounts.
#[async_trait]
pub trait NoteProvider: Send + Sync {
    /// Resynchronize the account's private state with the ledger.
    async fn sync_account(&self, escrow_address: &str) -> LedgerResult<()>;

    /// Fetch the account's decrypted notes, oldest first.
    ///
    /// An empty vec is a valid answer and does not imply a zero position.
    async fn fetch_notes(&self, escrow_address: &str) -> LedgerResult<Vec<Note>>;
}

/// Builds, signs and submits liquidation transactions.
#[async_trait]
pub trait TxExecutor: Send + Sync {
    /// Submit a liquidation transaction and await its receipt.
    async fn submit_liquidation(&self, request: &LiquidationRequest) -> LedgerResult<TxReceipt>;
}
