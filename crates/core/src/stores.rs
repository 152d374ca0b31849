//! Shared in-memory stores.
//!
//! Each store is owned by exactly one writing component but read concurrently
//! from the engine and the HTTP handlers, so all of them sit on dashmap. Writes
//! are whole-record replacements; a reader never observes a half-updated entry.

use dashmap::DashMap;
use tracing::debug;

use crate::error::MonitorError;
use crate::types::{CollateralPosition, EscrowAccount, PricePoint};

/// Latest market price per tracked symbol. Written only by the PriceMonitor.
#[derive(Debug, Default)]
pub struct PriceStore {
    prices: DashMap<String, PricePoint>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached price for a symbol.
    pub fn insert(&self, point: PricePoint) {
        self.prices.insert(point.symbol.clone(), point);
    }

    pub fn get(&self, symbol: &str) -> Option<PricePoint> {
        self.prices.get(symbol).map(|p| p.clone())
    }

    /// Snapshot of every cached price.
    pub fn snapshot(&self) -> Vec<PricePoint> {
        self.prices.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Latest decoded position per escrow. Written only by the PositionSyncService.
#[derive(Debug, Default)]
pub struct PositionStore {
    positions: DashMap<String, CollateralPosition>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached position for an escrow.
    pub fn upsert(&self, position: CollateralPosition) {
        self.positions
            .insert(position.escrow_address.clone(), position);
    }

    pub fn get(&self, escrow_address: &str) -> Option<CollateralPosition> {
        self.positions.get(escrow_address).map(|p| p.clone())
    }

    /// Snapshot of every cached position, ordered by escrow address for stable
    /// pagination.
    pub fn all(&self) -> Vec<CollateralPosition> {
        let mut all: Vec<_> = self.positions.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.escrow_address.cmp(&b.escrow_address));
        all
    }

    /// Positions whose collateral is the given asset, paginated.
    pub fn by_collateral(&self, asset: &str, limit: usize, offset: usize) -> Vec<CollateralPosition> {
        self.all()
            .into_iter()
            .filter(|p| p.collateral_asset == asset)
            .skip(offset)
            .take(limit)
            .collect()
    }

    /// Escrow addresses whose collateral is the given asset.
    pub fn escrows_with_collateral(&self, asset: &str) -> Vec<String> {
        self.positions
            .iter()
            .filter(|e| e.value().collateral_asset == asset)
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Registered escrow accounts.
#[derive(Debug)]
pub struct EscrowRegistry {
    escrows: DashMap<String, EscrowAccount>,
    capacity: usize,
}

impl EscrowRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            escrows: DashMap::new(),
            capacity,
        }
    }

    /// Register an escrow account. Duplicate addresses conflict; the registry
    /// refuses new accounts past capacity.
    pub fn register(&self, escrow: EscrowAccount) -> Result<(), MonitorError> {
        if self.escrows.len() >= self.capacity {
            return Err(MonitorError::validation(format!(
                "registry full ({} escrows)",
                self.capacity
            )));
        }

        match self.escrows.entry(escrow.address.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(MonitorError::conflict(format!(
                "escrow {} already registered",
                escrow.address
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(address = %escrow.address, "Registered escrow");
                slot.insert(escrow);
                Ok(())
            }
        }
    }

    pub fn get(&self, address: &str) -> Option<EscrowAccount> {
        self.escrows.get(address).map(|e| e.clone())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.escrows.contains_key(address)
    }

    /// Snapshot of every registered escrow, ordered by address.
    pub fn all(&self) -> Vec<EscrowAccount> {
        let mut all: Vec<_> = self.escrows.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.address.cmp(&b.address));
        all
    }

    pub fn addresses(&self) -> Vec<String> {
        self.escrows.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.escrows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.escrows.is_empty()
    }
}
