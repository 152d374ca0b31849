//! VeilLend Liquidation Monitor
//!
//! Keeps the lending protocol solvent by running three independent loops over
//! shared in-memory caches:
//! - price polling with on-chain oracle propagation
//! - private-position synchronization from escrow notes
//! - a reconciliation sweep backing up the event-driven liquidation engine
//!
//! The ledger collaborators (oracle, note provider, transaction executor) are
//! the in-memory reference implementations; the price feed can point at a real
//! upstream service via PRICE_SERVICE_URL.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use monitor_core::{
    EscrowRegistry, LiquidationEngine, LiquidationExecutor, MonitorConfig, PositionStore,
    PositionSyncService, PriceMonitor, PriceStore, ScheduledTask,
};
use monitor_ledger::mock::{MockNoteProvider, MockOracle, MockPriceSource, MockTxExecutor};
use monitor_ledger::{HttpPriceSource, PriceSource};
use monitor_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,monitor_core=debug,monitor_ledger=debug")),
        )
        .init();

    let config = Arc::new(MonitorConfig::from_env());
    config.log_config();

    info!("Starting VeilLend liquidation monitor");

    // Stores: each owned by one writing component, read everywhere.
    let prices = Arc::new(PriceStore::new());
    let positions = Arc::new(PositionStore::new());
    let registry = Arc::new(EscrowRegistry::new(config.max_tracked_escrows));

    // Ledger collaborators. The oracle, note provider and tx executor are the
    // in-memory reference implementations; swap in real adapters here.
    let price_source: Arc<dyn PriceSource> = match &config.price_service_url {
        Some(url) => {
            info!(url = %url, "Using upstream price service");
            Arc::new(HttpPriceSource::new(url.clone(), config.api_key.clone()))
        }
        None => {
            info!("No PRICE_SERVICE_URL set, using mock price source");
            Arc::new(MockPriceSource::new(default_mock_prices(&config)))
        }
    };
    let oracle = Arc::new(MockOracle::new());
    let note_provider = Arc::new(MockNoteProvider::new());
    let tx_executor = Arc::new(MockTxExecutor::new());

    // Engine and executor.
    let executor = Arc::new(LiquidationExecutor::new(tx_executor));
    let (engine, engine_handle) = LiquidationEngine::new(
        positions.clone(),
        prices.clone(),
        executor,
        config.risk.clone(),
    );

    let price_monitor = Arc::new(PriceMonitor::new(
        price_source,
        oracle,
        prices.clone(),
        engine_handle.clone(),
        &config,
    ));
    let sync = Arc::new(PositionSyncService::new(
        note_provider,
        registry.clone(),
        positions.clone(),
        engine_handle,
    ));

    // Engine event loop.
    let engine_task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run().await }
    });

    // Polling loops.
    let price_task = ScheduledTask::spawn("price-monitor", config.price_poll_interval(), {
        let monitor = price_monitor.clone();
        move || {
            let monitor = monitor.clone();
            async move { monitor.fetch_and_evaluate().await }
        }
    });
    let sync_task = Arc::new(ScheduledTask::spawn(
        "position-sync",
        config.sync_interval(),
        {
            let sync = sync.clone();
            move || {
                let sync = sync.clone();
                async move { sync.sync_all().await }
            }
        },
    ));
    let sweep_task = ScheduledTask::spawn("reconciliation-sweep", config.sweep_interval(), {
        let engine = engine.clone();
        move || {
            let engine = engine.clone();
            async move { engine.sweep().await }
        }
    });

    info!("All components initialized");

    // HTTP surface.
    let state = AppState {
        config: config.clone(),
        registry,
        positions,
        prices,
        price_monitor,
        sync,
        sync_task: sync_task.clone(),
    };

    monitor_server::serve(&config.http_addr, state, shutdown_signal()).await?;

    // Stop timers; in-flight I/O drains but is not force-cancelled.
    info!("Shutting down");
    price_task.stop().await;
    sync_task.stop().await;
    sweep_task.stop().await;
    engine_task.abort();

    info!("Goodbye");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Seed prices for the mock source, one per tracked asset.
fn default_mock_prices(config: &MonitorConfig) -> HashMap<String, f64> {
    config
        .tracked_assets
        .iter()
        .map(|asset| {
            let price = match asset.symbol.as_str() {
                "ETH" => 3200.0,
                "USDC" | "DAI" => 1.0,
                _ => 100.0,
            };
            (asset.symbol.clone(), price)
        })
        .collect()
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ╦  ╦┌─┐┬┬  ╦  ┌─┐┌┐┌┌┬┐
    ╚╗╔╝├┤ ││  ║  ├┤ │││ ││
     ╚╝ └─┘┴┴─┘╩═╝└─┘┘└┘─┴┘
    Liquidation Monitor v0.1.0
    "#
    );
}
