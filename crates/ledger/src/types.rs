//! Wire types shared with the ledger collaborators.

use serde::{Deserialize, Serialize};

/// A decrypted private-state record for one escrow account.
///
/// The ledger's unit of private data. Each note carries the full collateral/debt
/// snapshot for the escrow at the time it was emitted; the most recent note wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Escrow contract address the note belongs to
    pub escrow_address: String,
    /// Collateral token symbol
    pub collateral_asset: String,
    /// Collateral amount in whole token units
    pub collateral_amount: f64,
    /// Debt token symbol
    pub debt_asset: String,
    /// Outstanding debt principal
    pub debt_amount: f64,
    /// Lending pool identifier
    pub pool_id: String,
    /// Note emission time (epoch milliseconds)
    pub created_at_ms: u64,
}

/// Receipt returned for a confirmed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    /// Transaction hash as reported by the node
    pub tx_hash: String,
    /// Block the transaction landed in
    pub block_number: u64,
}

/// Parameters for a liquidation transaction submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationRequest {
    /// Escrow account being liquidated
    pub escrow_address: String,
    /// Collateral token to seize
    pub collateral_asset: String,
    /// Debt token being repaid
    pub debt_asset: String,
    /// Debt amount (USD) to close
    pub amount: f64,
}
