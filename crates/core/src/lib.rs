//! Liquidation monitor core pipeline.
//!
//! This crate provides the control loop that keeps the lending protocol solvent:
//! - Price ingestion and on-chain oracle propagation (PriceMonitor)
//! - Private position synchronization from escrow notes (PositionSyncService)
//! - Pure risk/eligibility computation (checker)
//! - Liquidation submission and outcome logging (LiquidationExecutor)
//! - The engine coupling the triggers to the checker and executor
//!
//! All external I/O goes through the `monitor-ledger` collaborator traits, so the
//! whole pipeline is unit-testable against in-memory fakes.

mod checker;
pub mod config;
mod engine;
mod error;
mod executor;
mod position_sync;
mod price_monitor;
mod stores;
mod task;
mod types;

pub use checker::{check_eligibility, check_positions, liquidation_params};
pub use config::{MonitorConfig, RiskConfig};
pub use engine::{EngineEvent, EngineHandle, LiquidationEngine};
pub use error::MonitorError;
pub use executor::LiquidationExecutor;
pub use position_sync::PositionSyncService;
pub use price_monitor::PriceMonitor;
pub use stores::{EscrowRegistry, PositionStore, PriceStore};
pub use task::{for_each_isolated, ScheduledTask};
pub use types::{
    now_ms, Asset, CollateralPosition, EscrowAccount, EscrowKind, LiquidationEligibility,
    LiquidationParams, LiquidationResult, PricePoint,
};
