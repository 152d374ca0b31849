//! Runtime configuration for the liquidation monitor.
//!
//! Environment-style: every knob has a serde default and an env var override,
//! loaded once at startup before any component is constructed.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::types::Asset;

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Percentage move that justifies an on-chain price write
    #[serde(default = "default_price_change_threshold")]
    pub price_change_threshold_pct: f64,

    /// Staleness floor: push on-chain even without movement after this long (ms)
    #[serde(default = "default_max_update_interval")]
    pub max_update_interval_ms: u64,

    /// Price polling cadence (ms)
    #[serde(default = "default_price_poll_interval")]
    pub price_poll_interval_ms: u64,

    /// Position sync cadence (ms)
    #[serde(default = "default_sync_interval")]
    pub sync_interval_ms: u64,

    /// Reconciliation sweep cadence (ms); compensates for lost notifications
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,

    /// Maximum escrow accounts accepted by the registry
    #[serde(default = "default_max_tracked_escrows")]
    pub max_tracked_escrows: usize,

    /// Assets the price loop tracks
    #[serde(default = "default_tracked_assets")]
    pub tracked_assets: Vec<Asset>,

    /// API key required on authenticated inter-service endpoints
    #[serde(default)]
    pub api_key: String,

    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Upstream price-service base URL; unset means the mock source
    #[serde(default)]
    pub price_service_url: Option<String>,

    /// Ledger node URL (informational while collaborators are mocked)
    #[serde(default)]
    pub node_url: Option<String>,

    /// Risk parameters for the checker
    #[serde(default)]
    pub risk: RiskConfig,
}

fn default_price_change_threshold() -> f64 {
    0.5
}
fn default_max_update_interval() -> u64 {
    300_000
}
fn default_price_poll_interval() -> u64 {
    10_000
}
fn default_sync_interval() -> u64 {
    30_000
}
fn default_sweep_interval() -> u64 {
    60_000
}
fn default_max_tracked_escrows() -> usize {
    500
}
fn default_http_addr() -> String {
    "0.0.0.0:3000".to_string()
}
fn default_tracked_assets() -> Vec<Asset> {
    vec![
        Asset { symbol: "ETH".into(), decimals: 18 },
        Asset { symbol: "USDC".into(), decimals: 6 },
        Asset { symbol: "DAI".into(), decimals: 18 },
    ]
}

/// Risk parameters consumed by the eligibility math.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Annual interest rate applied to debt principal (decimal, 0.05 = 5%)
    #[serde(default = "default_interest_rate")]
    pub interest_rate_annual: f64,

    /// Safety-margin divisor applied to debt in the health factor
    #[serde(default = "default_collateralization_threshold")]
    pub collateralization_threshold: f64,

    /// Extra collateral awarded to the liquidator (decimal, 0.05 = 5%)
    #[serde(default = "default_liquidation_bonus")]
    pub liquidation_bonus: f64,

    /// Share of outstanding debt one liquidation may close
    #[serde(default = "default_close_factor")]
    pub close_factor: f64,
}

fn default_interest_rate() -> f64 {
    0.05
}
fn default_collateralization_threshold() -> f64 {
    1.5
}
fn default_liquidation_bonus() -> f64 {
    0.05
}
fn default_close_factor() -> f64 {
    0.5
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            interest_rate_annual: default_interest_rate(),
            collateralization_threshold: default_collateralization_threshold(),
            liquidation_bonus: default_liquidation_bonus(),
            close_factor: default_close_factor(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            price_change_threshold_pct: default_price_change_threshold(),
            max_update_interval_ms: default_max_update_interval(),
            price_poll_interval_ms: default_price_poll_interval(),
            sync_interval_ms: default_sync_interval(),
            sweep_interval_ms: default_sweep_interval(),
            max_tracked_escrows: default_max_tracked_escrows(),
            tracked_assets: default_tracked_assets(),
            api_key: String::new(),
            http_addr: default_http_addr(),
            price_service_url: None,
            node_url: None,
            risk: RiskConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_f64("PRICE_CHANGE_THRESHOLD") {
            cfg.price_change_threshold_pct = v;
        }
        if let Some(v) = env_u64("MAX_UPDATE_INTERVAL_MS") {
            cfg.max_update_interval_ms = v;
        }
        if let Some(v) = env_u64("PRICE_POLL_INTERVAL_MS") {
            cfg.price_poll_interval_ms = v;
        }
        if let Some(v) = env_u64("SYNC_INTERVAL_MS") {
            cfg.sync_interval_ms = v;
        }
        if let Some(v) = env_u64("SWEEP_INTERVAL_MS") {
            cfg.sweep_interval_ms = v;
        }
        if let Some(v) = env_u64("MAX_TRACKED_ESCROWS") {
            cfg.max_tracked_escrows = v as usize;
        }
        if let Ok(v) = std::env::var("TRACKED_ASSETS") {
            if let Some(assets) = parse_tracked_assets(&v) {
                cfg.tracked_assets = assets;
            }
        }
        if let Ok(v) = std::env::var("API_KEY") {
            cfg.api_key = v;
        }
        if let Ok(v) = std::env::var("HTTP_ADDR") {
            cfg.http_addr = v;
        }
        if let Ok(v) = std::env::var("PRICE_SERVICE_URL") {
            cfg.price_service_url = Some(v);
        }
        if let Ok(v) = std::env::var("NODE_URL") {
            cfg.node_url = Some(v);
        }
        if let Some(v) = env_f64("INTEREST_RATE") {
            cfg.risk.interest_rate_annual = v;
        }
        if let Some(v) = env_f64("COLLATERALIZATION_THRESHOLD") {
            cfg.risk.collateralization_threshold = v;
        }
        if let Some(v) = env_f64("LIQUIDATION_BONUS") {
            cfg.risk.liquidation_bonus = v;
        }

        cfg
    }

    /// Log the effective configuration at startup.
    pub fn log_config(&self) {
        info!(
            price_change_threshold_pct = self.price_change_threshold_pct,
            max_update_interval_ms = self.max_update_interval_ms,
            price_poll_interval_ms = self.price_poll_interval_ms,
            sync_interval_ms = self.sync_interval_ms,
            sweep_interval_ms = self.sweep_interval_ms,
            max_tracked_escrows = self.max_tracked_escrows,
            tracked_assets = self.tracked_assets.len(),
            price_source = self.price_service_url.as_deref().unwrap_or("mock"),
            http_addr = %self.http_addr,
            "Monitor configuration"
        );
        info!(
            interest_rate = self.risk.interest_rate_annual,
            collateralization_threshold = self.risk.collateralization_threshold,
            liquidation_bonus = self.risk.liquidation_bonus,
            close_factor = self.risk.close_factor,
            "Risk configuration"
        );
    }

    pub fn price_poll_interval(&self) -> Duration {
        Duration::from_millis(self.price_poll_interval_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Symbols the price loop polls.
    pub fn tracked_symbols(&self) -> Vec<String> {
        self.tracked_assets.iter().map(|a| a.symbol.clone()).collect()
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok()?.parse().ok()
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.parse().ok()
}

/// Parse `"ETH:18,USDC:6"` into assets. Returns None on any malformed entry.
fn parse_tracked_assets(raw: &str) -> Option<Vec<Asset>> {
    let mut assets = Vec::new();
    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let (symbol, decimals) = entry.trim().split_once(':')?;
        assets.push(Asset {
            symbol: symbol.trim().to_string(),
            decimals: decimals.trim().parse().ok()?,
        });
    }
    if assets.is_empty() {
        None
    } else {
        Some(assets)
    }
}
