//! Liquidation engine: couples the price and sync triggers to the checker and
//! the executor.
//!
//! Both trigger sources notify the engine over an unbounded channel. Delivery is
//! best-effort; a slower reconciliation sweep re-checks every position against
//! the latest caches so a lost notification can only delay a liquidation, never
//! lose it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::checker::{check_eligibility, liquidation_params};
use crate::config::RiskConfig;
use crate::executor::LiquidationExecutor;
use crate::stores::{PositionStore, PriceStore};
use crate::types::now_ms;

/// Cross-service notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// An on-chain price write went through for this symbol.
    PriceChanged { symbol: String },
    /// The position cache was overwritten for this escrow.
    PositionSynced { escrow_address: String },
}

/// Fire-and-forget sender handle held by the notifying services.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineHandle {
    /// Wrap a raw sender; used when wiring the services to an engine channel.
    pub fn from_sender(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }

    /// Best-effort send. A dead engine is logged and otherwise ignored; the
    /// notifying tick must never fail because of it.
    pub fn notify(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            warn!("Engine channel closed, notification dropped");
        }
    }
}

/// Event-driven re-evaluation of positions, funneling into the executor.
pub struct LiquidationEngine {
    positions: Arc<PositionStore>,
    prices: Arc<PriceStore>,
    executor: Arc<LiquidationExecutor>,
    risk: RiskConfig,
    rx: Mutex<mpsc::UnboundedReceiver<EngineEvent>>,
}

impl LiquidationEngine {
    /// Create the engine and the handle its notifiers use.
    pub fn new(
        positions: Arc<PositionStore>,
        prices: Arc<PriceStore>,
        executor: Arc<LiquidationExecutor>,
        risk: RiskConfig,
    ) -> (Arc<Self>, EngineHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            positions,
            prices,
            executor,
            risk,
            rx: Mutex::new(rx),
        });
        (engine, EngineHandle { tx })
    }

    /// Consume notifications until every sender is dropped.
    pub async fn run(&self) {
        let mut rx = self.rx.lock().await;
        info!("Liquidation engine listening");

        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::PriceChanged { symbol } => self.on_price_changed(&symbol).await,
                EngineEvent::PositionSynced { escrow_address } => {
                    self.evaluate_escrow(&escrow_address).await
                }
            }
        }

        info!("Liquidation engine channel drained, exiting");
    }

    /// Re-evaluate every position keyed to the changed asset.
    #[instrument(skip(self))]
    async fn on_price_changed(&self, symbol: &str) {
        let affected = self.positions.escrows_with_collateral(symbol);
        debug!(symbol, affected = affected.len(), "Price change trigger");

        for escrow in affected {
            self.evaluate_escrow(&escrow).await;
        }
    }

    /// Re-evaluate one escrow against the freshest caches.
    ///
    /// Always recomputes from current snapshots; a verdict computed earlier in
    /// the pipeline is never reused.
    pub async fn evaluate_escrow(&self, escrow_address: &str) {
        if self.executor.is_in_flight(escrow_address) {
            debug!(escrow = %escrow_address, "Liquidation in flight, skipping evaluation");
            return;
        }

        let Some(position) = self.positions.get(escrow_address) else {
            debug!(escrow = %escrow_address, "No cached position yet");
            return;
        };

        let Some(price) = self.prices.get(&position.collateral_asset) else {
            warn!(
                escrow = %escrow_address,
                asset = %position.collateral_asset,
                "No cached price for collateral asset, skipping evaluation"
            );
            return;
        };

        let verdict = check_eligibility(&position, price.price, now_ms(), &self.risk);

        if !verdict.is_liquidatable {
            debug!(
                escrow = %escrow_address,
                health_factor = verdict.health_factor,
                "Position healthy"
            );
            return;
        }

        info!(
            escrow = %escrow_address,
            health_factor = verdict.health_factor,
            collateral_value = verdict.collateral_value,
            debt_value = verdict.debt_value,
            "Position liquidatable"
        );

        let params = liquidation_params(&position, price.price, &verdict, &self.risk);
        let result = self.executor.execute(&params).await;

        if result.success {
            info!(
                escrow = %escrow_address,
                tx_hash = result.tx_hash.as_deref().unwrap_or(""),
                amount = result.liquidation_amount,
                "Liquidation confirmed"
            );
        } else {
            // No immediate retry: the next price tick, sync tick or sweep
            // re-evaluates from fresh caches.
            warn!(
                escrow = %escrow_address,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Liquidation attempt failed"
            );
        }
    }

    /// Reconciliation sweep: re-evaluate every cached position.
    ///
    /// Bounds the staleness introduced by dropped notifications.
    #[instrument(skip(self))]
    pub async fn sweep(&self) {
        let positions = self.positions.all();
        if positions.is_empty() {
            return;
        }

        let price_map: HashMap<String, f64> = self
            .prices
            .snapshot()
            .into_iter()
            .map(|p| (p.symbol, p.price))
            .collect();

        let verdicts =
            crate::checker::check_positions(&positions, &price_map, now_ms(), &self.risk);
        let at_risk: Vec<_> = verdicts.iter().filter(|v| v.is_liquidatable).collect();

        debug!(
            total = positions.len(),
            at_risk = at_risk.len(),
            "Reconciliation sweep"
        );

        for verdict in at_risk {
            self.evaluate_escrow(&verdict.escrow_address).await;
        }
    }
}
