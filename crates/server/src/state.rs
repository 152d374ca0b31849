//! Shared handler state.

use std::sync::Arc;

use monitor_core::{
    EscrowRegistry, MonitorConfig, PositionStore, PositionSyncService, PriceMonitor, PriceStore,
    ScheduledTask,
};

/// Everything the HTTP handlers can reach. All fields are shared snapshots of
/// components owned elsewhere; the handlers never own pipeline state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MonitorConfig>,
    pub registry: Arc<EscrowRegistry>,
    pub positions: Arc<PositionStore>,
    pub prices: Arc<PriceStore>,
    pub price_monitor: Arc<PriceMonitor>,
    pub sync: Arc<PositionSyncService>,
    /// The sync polling loop, exposed for /health status.
    pub sync_task: Arc<ScheduledTask>,
}
