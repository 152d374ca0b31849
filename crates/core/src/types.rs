//! Data model for the liquidation-monitoring pipeline.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use monitor_ledger::Note;

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A tracked fungible token identity. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Token symbol, e.g. "ETH"
    pub symbol: String,
    /// Token decimals
    pub decimals: u8,
}

/// Latest fetched market price for an asset. Superseded by each fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    /// Token symbol
    pub symbol: String,
    /// USD price, always positive
    pub price: f64,
    /// Fetch time (epoch milliseconds)
    pub timestamp_ms: u64,
    /// Where the price came from ("upstream", "mock", "webhook")
    pub source: String,
}

/// Escrow account flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowKind {
    Lending,
    Stable,
}

/// Registration record for a borrower's escrow account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowAccount {
    /// Escrow contract address
    pub address: String,
    /// Account flavour
    pub kind: EscrowKind,
    /// Lending pool contract address
    pub pool_address: String,
    /// Collateral token symbol
    pub collateral_token: String,
    /// Debt token symbol
    pub debt_token: String,
    /// Registration time (epoch milliseconds)
    pub registered_at_ms: u64,
}

/// Decoded collateral/debt snapshot for one escrow account.
///
/// Created on first successful sync, replaced whole on each subsequent sync,
/// never deleted while the escrow stays registered. `last_updated_ms` is
/// monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollateralPosition {
    /// Escrow contract address
    pub escrow_address: String,
    /// Collateral token symbol
    pub collateral_asset: String,
    /// Collateral amount in whole token units
    pub collateral_amount: f64,
    /// Debt token symbol
    pub debt_asset: String,
    /// Outstanding debt principal (USD)
    pub debt_amount: f64,
    /// Lending pool identifier
    pub pool_id: String,
    /// Last successful sync time (epoch milliseconds)
    pub last_updated_ms: u64,
}

impl CollateralPosition {
    /// Decode the most recent note for an escrow into a position snapshot.
    pub fn from_note(note: &Note, synced_at_ms: u64) -> Self {
        Self {
            escrow_address: note.escrow_address.clone(),
            collateral_asset: note.collateral_asset.clone(),
            collateral_amount: note.collateral_amount,
            debt_asset: note.debt_asset.clone(),
            debt_amount: note.debt_amount,
            pool_id: note.pool_id.clone(),
            last_updated_ms: synced_at_ms,
        }
    }

    /// A closed position holds nothing and owes nothing.
    pub fn is_closed(&self) -> bool {
        self.collateral_amount == 0.0 && self.debt_amount == 0.0
    }
}

/// Risk verdict for one position at one price. Derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationEligibility {
    /// Escrow the verdict applies to
    pub escrow_address: String,
    /// Collateral valued at the current price (USD)
    pub collateral_value: f64,
    /// Principal plus accrued interest (USD)
    pub debt_value: f64,
    /// Risk score; strictly below 1.0 means liquidatable
    pub health_factor: f64,
    /// Whether the position can be liquidated right now
    pub is_liquidatable: bool,
}

/// Concrete parameters for one liquidation attempt. Derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationParams {
    /// Escrow being liquidated
    pub escrow_address: String,
    /// Collateral token to seize
    pub collateral_asset: String,
    /// Debt token being repaid
    pub debt_asset: String,
    /// Debt amount to close (USD), capped at half the outstanding debt
    pub liquidation_amount: f64,
    /// Collateral units to seize including the bonus
    pub collateral_to_seize: f64,
    /// Bonus portion valued at the current price (USD)
    pub expected_profit: f64,
}

/// Execution-log entry for one liquidation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationResult {
    /// Whether the transaction confirmed
    pub success: bool,
    /// Transaction hash when confirmed
    pub tx_hash: Option<String>,
    /// Escrow the attempt targeted
    pub escrow_address: String,
    /// Debt amount the attempt tried to close (USD)
    pub liquidation_amount: f64,
    /// Attempt completion time (epoch milliseconds)
    pub timestamp_ms: u64,
    /// Failure detail when not confirmed
    pub error: Option<String>,
}
