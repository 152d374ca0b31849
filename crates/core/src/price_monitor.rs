//! Price ingestion and on-chain oracle propagation.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::MonitorConfig;
use crate::engine::{EngineEvent, EngineHandle};
use crate::error::MonitorError;
use crate::stores::PriceStore;
use crate::types::{now_ms, PricePoint};
use monitor_ledger::{OracleWriter, PriceSource};

/// Last price this monitor successfully wrote on-chain for an asset.
#[derive(Debug, Clone, Copy)]
struct OnChainState {
    last_pushed: f64,
    last_update_ms: u64,
}

/// Keeps the off-chain price cache fresh and decides when a change is material
/// enough to write on-chain.
///
/// Per-asset on-chain state only advances on a successful oracle write, so a
/// failed write retries from the same baseline on the next tick. The polling
/// tick and the webhook path share one lock; two evaluation passes can never
/// interleave on the same asset.
pub struct PriceMonitor {
    source: Arc<dyn PriceSource>,
    oracle: Arc<dyn OracleWriter>,
    prices: Arc<PriceStore>,
    engine: EngineHandle,
    onchain: DashMap<String, OnChainState>,
    evaluate_lock: Mutex<()>,
    symbols: Vec<String>,
    change_threshold_pct: f64,
    max_update_interval_ms: u64,
}

impl PriceMonitor {
    pub fn new(
        source: Arc<dyn PriceSource>,
        oracle: Arc<dyn OracleWriter>,
        prices: Arc<PriceStore>,
        engine: EngineHandle,
        cfg: &MonitorConfig,
    ) -> Self {
        Self {
            source,
            oracle,
            prices,
            engine,
            onchain: DashMap::new(),
            evaluate_lock: Mutex::new(()),
            symbols: cfg.tracked_symbols(),
            change_threshold_pct: cfg.price_change_threshold_pct,
            max_update_interval_ms: cfg.max_update_interval_ms,
        }
    }

    /// One polling tick: batch-fetch every tracked symbol, refresh the cache,
    /// then run the per-asset update decision.
    ///
    /// The batch is atomic: a fetch failure skips the whole tick and no cache
    /// entry moves.
    #[instrument(skip(self))]
    pub async fn fetch_and_evaluate(&self) {
        let _guard = self.evaluate_lock.lock().await;

        let fetched = match self.source.fetch_prices(&self.symbols).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(error = %e, "Price fetch failed, skipping tick");
                return;
            }
        };

        let now = now_ms();
        for symbol in &self.symbols {
            let Some(price) = fetched.get(symbol).copied() else {
                // The source contract guarantees full batches; treat a hole as
                // a protocol bug rather than corrupting the cache partially.
                warn!(symbol, "Price source omitted tracked symbol");
                continue;
            };

            self.prices.insert(PricePoint {
                symbol: symbol.clone(),
                price,
                timestamp_ms: now,
                source: "poll".into(),
            });

            self.evaluate_symbol(symbol, price, now).await;
        }
    }

    /// Apply a push from the upstream price service (webhook path).
    ///
    /// Runs the same update decision as the polling loop.
    pub async fn apply_external_update(
        &self,
        symbol: &str,
        price: f64,
        timestamp_ms: Option<u64>,
    ) -> Result<(), MonitorError> {
        if price <= 0.0 {
            return Err(MonitorError::validation(format!(
                "price must be positive, got {}",
                price
            )));
        }
        if !self.symbols.iter().any(|s| s == symbol) {
            return Err(MonitorError::validation(format!(
                "asset {} is not tracked",
                symbol
            )));
        }

        let _guard = self.evaluate_lock.lock().await;
        let now = now_ms();

        self.prices.insert(PricePoint {
            symbol: symbol.to_string(),
            price,
            timestamp_ms: timestamp_ms.unwrap_or(now),
            source: "webhook".into(),
        });

        self.evaluate_symbol(symbol, price, now).await;
        Ok(())
    }

    /// Decide whether the new price warrants an on-chain write, and do it.
    ///
    /// Caller holds `evaluate_lock`.
    async fn evaluate_symbol(&self, symbol: &str, new_price: f64, now: u64) {
        let Some(state) = self.onchain.get(symbol).map(|s| *s) else {
            // Cold start: initialize the on-chain price immediately and stop.
            match self.oracle.update_price(symbol, new_price).await {
                Ok(()) => {
                    self.onchain.insert(
                        symbol.to_string(),
                        OnChainState { last_pushed: new_price, last_update_ms: now },
                    );
                    info!(symbol, price = new_price, "Bootstrapped on-chain price");
                }
                Err(e) => {
                    warn!(symbol, error = %e, "On-chain bootstrap failed, will retry next tick");
                }
            }
            return;
        };

        let pct_change = ((new_price - state.last_pushed) / state.last_pushed).abs() * 100.0;
        let stale = now.saturating_sub(state.last_update_ms) >= self.max_update_interval_ms;

        if pct_change < self.change_threshold_pct && !stale {
            debug!(
                symbol,
                pct_change,
                threshold = self.change_threshold_pct,
                "Price move below threshold"
            );
            return;
        }

        match self.oracle.update_price(symbol, new_price).await {
            Ok(()) => {
                self.onchain.insert(
                    symbol.to_string(),
                    OnChainState { last_pushed: new_price, last_update_ms: now },
                );
                info!(
                    symbol,
                    price = new_price,
                    pct_change,
                    stale,
                    "On-chain price updated"
                );
                // Best effort: a dropped notification is compensated by the
                // reconciliation sweep, and must not fail the write path.
                self.engine.notify(EngineEvent::PriceChanged {
                    symbol: symbol.to_string(),
                });
            }
            Err(e) => {
                // Baseline untouched; the next tick retries the same decision.
                warn!(symbol, error = %e, "On-chain price write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineEvent;
    use monitor_ledger::mock::{MockOracle, MockPriceSource};
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    fn config() -> MonitorConfig {
        MonitorConfig {
            price_change_threshold_pct: 0.5,
            max_update_interval_ms: 300_000,
            ..MonitorConfig::default()
        }
    }

    fn monitor_with(
        cfg: MonitorConfig,
        seed: f64,
    ) -> (
        PriceMonitor,
        Arc<MockPriceSource>,
        Arc<MockOracle>,
        mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        let source = Arc::new(MockPriceSource::new(HashMap::from([
            ("ETH".to_string(), seed),
            ("USDC".to_string(), 1.0),
            ("DAI".to_string(), 1.0),
        ])));
        let oracle = Arc::new(MockOracle::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = PriceMonitor::new(
            source.clone(),
            oracle.clone(),
            Arc::new(PriceStore::new()),
            EngineHandle::from_sender(tx),
            &cfg,
        );
        (monitor, source, oracle, rx)
    }

    #[tokio::test]
    async fn cold_start_bootstraps_without_notifying() {
        let (monitor, _source, oracle, mut rx) = monitor_with(config(), 100.0);

        monitor.fetch_and_evaluate().await;

        assert_eq!(oracle.get_price("ETH").await.unwrap(), Some(100.0));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn threshold_boundary() {
        let (monitor, source, oracle, mut rx) = monitor_with(config(), 100.0);
        monitor.fetch_and_evaluate().await;
        let bootstrap_writes = oracle.write_count();

        // 0.4% move: below the 0.5% threshold, no write.
        source.set_price("ETH", 100.4);
        monitor.fetch_and_evaluate().await;
        assert_eq!(oracle.write_count(), bootstrap_writes);
        assert_eq!(oracle.get_price("ETH").await.unwrap(), Some(100.0));

        // 0.6% move: triggers a write and a notification.
        source.set_price("ETH", 100.6);
        monitor.fetch_and_evaluate().await;
        assert_eq!(oracle.get_price("ETH").await.unwrap(), Some(100.6));
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::PriceChanged { symbol: "ETH".into() }
        );
    }

    #[tokio::test]
    async fn staleness_floor_fires_without_movement() {
        let mut cfg = config();
        cfg.max_update_interval_ms = 0; // every tick is past the floor
        let (monitor, _source, oracle, _rx) = monitor_with(cfg, 100.0);

        monitor.fetch_and_evaluate().await;
        let after_bootstrap = oracle.write_count();

        // No movement at all, still written because of the staleness floor.
        monitor.fetch_and_evaluate().await;
        assert_eq!(oracle.write_count(), after_bootstrap + 3);
    }

    #[tokio::test]
    async fn fetch_failure_skips_tick_without_cache_corruption() {
        let (monitor, source, oracle, _rx) = monitor_with(config(), 100.0);
        monitor.fetch_and_evaluate().await;

        source.set_price("ETH", 200.0);
        source.fail_next_fetch();
        monitor.fetch_and_evaluate().await;

        // Neither cache nor on-chain state moved.
        assert_eq!(monitor.prices.get("ETH").unwrap().price, 100.0);
        assert_eq!(oracle.get_price("ETH").await.unwrap(), Some(100.0));
    }

    #[tokio::test]
    async fn failed_write_keeps_baseline_for_retry() {
        let (monitor, source, oracle, mut rx) = monitor_with(config(), 100.0);
        monitor.fetch_and_evaluate().await;

        source.set_price("ETH", 102.0);
        oracle.fail_next_write();
        monitor.fetch_and_evaluate().await;
        assert_eq!(oracle.get_price("ETH").await.unwrap(), Some(100.0));
        assert!(rx.try_recv().is_err());

        // Same baseline, same decision: the next tick retries and succeeds.
        monitor.fetch_and_evaluate().await;
        assert_eq!(oracle.get_price("ETH").await.unwrap(), Some(102.0));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn webhook_applies_same_decision() {
        let (monitor, _source, oracle, mut rx) = monitor_with(config(), 100.0);
        monitor.fetch_and_evaluate().await;

        // Below threshold: cache refreshed, no write.
        monitor
            .apply_external_update("ETH", 100.2, None)
            .await
            .unwrap();
        assert_eq!(monitor.prices.get("ETH").unwrap().price, 100.2);
        assert_eq!(oracle.get_price("ETH").await.unwrap(), Some(100.0));

        // Above threshold: write plus notification.
        monitor
            .apply_external_update("ETH", 101.0, None)
            .await
            .unwrap();
        assert_eq!(oracle.get_price("ETH").await.unwrap(), Some(101.0));
        assert!(rx.try_recv().is_ok());

        // Validation failures.
        assert!(monitor.apply_external_update("ETH", 0.0, None).await.is_err());
        assert!(monitor.apply_external_update("XYZ", 10.0, None).await.is_err());
    }
}
