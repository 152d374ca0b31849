//! Liquidation submission and outcome logging.

use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::RwLock;
use tracing::{info, instrument, warn};

use crate::types::{now_ms, LiquidationParams, LiquidationResult};
use monitor_ledger::{LiquidationRequest, TxExecutor};

/// Submits liquidation transactions and records every outcome.
///
/// Business failures never become `Err`: each attempt, confirmed or not, lands
/// in the append-only execution log so the scheduling layer can decide what to
/// do next. The executor itself never retries within a single invocation.
pub struct LiquidationExecutor {
    tx: Arc<dyn TxExecutor>,
    /// Escrows with a submission currently in flight.
    in_flight: DashSet<String>,
    /// Append-only execution log.
    history: RwLock<Vec<LiquidationResult>>,
}

impl LiquidationExecutor {
    pub fn new(tx: Arc<dyn TxExecutor>) -> Self {
        Self {
            tx,
            in_flight: DashSet::new(),
            history: RwLock::new(Vec::new()),
        }
    }

    /// Whether this escrow has an unresolved submission.
    ///
    /// The engine excludes such escrows from new eligibility evaluations.
    pub fn is_in_flight(&self, escrow_address: &str) -> bool {
        self.in_flight.contains(escrow_address)
    }

    /// Submit one liquidation and record the outcome.
    ///
    /// Two concurrent attempts for the same escrow cannot both submit: the
    /// second short-circuits to a failed result.
    #[instrument(skip(self, params), fields(escrow = %params.escrow_address))]
    pub async fn execute(&self, params: &LiquidationParams) -> LiquidationResult {
        if !self.in_flight.insert(params.escrow_address.clone()) {
            let result = LiquidationResult {
                success: false,
                tx_hash: None,
                escrow_address: params.escrow_address.clone(),
                liquidation_amount: params.liquidation_amount,
                timestamp_ms: now_ms(),
                error: Some("liquidation already in flight for this escrow".into()),
            };
            self.record(result.clone());
            return result;
        }

        info!(
            collateral = %params.collateral_asset,
            debt = %params.debt_asset,
            amount = params.liquidation_amount,
            seize = params.collateral_to_seize,
            expected_profit = params.expected_profit,
            "Submitting liquidation"
        );

        let request = LiquidationRequest {
            escrow_address: params.escrow_address.clone(),
            collateral_asset: params.collateral_asset.clone(),
            debt_asset: params.debt_asset.clone(),
            amount: params.liquidation_amount,
        };

        let result = match self.tx.submit_liquidation(&request).await {
            Ok(receipt) => LiquidationResult {
                success: true,
                tx_hash: Some(receipt.tx_hash),
                escrow_address: params.escrow_address.clone(),
                liquidation_amount: params.liquidation_amount,
                timestamp_ms: now_ms(),
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "Liquidation submission failed");
                LiquidationResult {
                    success: false,
                    tx_hash: None,
                    escrow_address: params.escrow_address.clone(),
                    liquidation_amount: params.liquidation_amount,
                    timestamp_ms: now_ms(),
                    error: Some(e.to_string()),
                }
            }
        };

        self.in_flight.remove(&params.escrow_address);
        self.record(result.clone());
        result
    }

    fn record(&self, result: LiquidationResult) {
        self.history.write().push(result);
    }

    /// Snapshot of the execution log, oldest first.
    pub fn history(&self) -> Vec<LiquidationResult> {
        self.history.read().clone()
    }
}
