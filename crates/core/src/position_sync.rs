//! Private-position synchronization.

use std::sync::Arc;

use dashmap::DashSet;
use tracing::{debug, info, instrument};

use crate::engine::{EngineEvent, EngineHandle};
use crate::error::MonitorError;
use crate::stores::{EscrowRegistry, PositionStore};
use crate::task::for_each_isolated;
use crate::types::{now_ms, CollateralPosition};
use monitor_ledger::NoteProvider;

/// Keeps the per-escrow collateral/debt snapshot current.
///
/// Each escrow syncs inside its own failure boundary: one account's error is
/// logged and the cycle moves on. A per-escrow in-flight guard keeps two sync
/// passes from interleaving on the same account; the later caller skips rather
/// than queues.
pub struct PositionSyncService {
    notes: Arc<dyn NoteProvider>,
    registry: Arc<EscrowRegistry>,
    positions: Arc<PositionStore>,
    engine: EngineHandle,
    syncing: DashSet<String>,
}

impl PositionSyncService {
    pub fn new(
        notes: Arc<dyn NoteProvider>,
        registry: Arc<EscrowRegistry>,
        positions: Arc<PositionStore>,
        engine: EngineHandle,
    ) -> Self {
        Self {
            notes,
            registry,
            positions,
            engine,
            syncing: DashSet::new(),
        }
    }

    /// One sync tick over every registered escrow.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) {
        let addresses = self.registry.addresses();
        if addresses.is_empty() {
            return;
        }

        let (ok, failed) =
            for_each_isolated("position-sync", &addresses, |address| self.sync_one(address)).await;

        debug!(ok, failed, "Sync cycle finished");
    }

    /// Resynchronize one escrow's private state and refresh its cached position.
    ///
    /// Zero notes leaves any cached position untouched: an empty read is not
    /// evidence of a zero position, and a last-known state must survive a
    /// transient empty answer.
    pub async fn sync_one(&self, escrow_address: &str) -> Result<(), MonitorError> {
        if !self.syncing.insert(escrow_address.to_string()) {
            debug!(escrow = %escrow_address, "Sync already in progress, skipping");
            return Ok(());
        }

        let result = self.sync_inner(escrow_address).await;
        self.syncing.remove(escrow_address);
        result
    }

    async fn sync_inner(&self, escrow_address: &str) -> Result<(), MonitorError> {
        self.notes.sync_account(escrow_address).await?;
        let notes = self.notes.fetch_notes(escrow_address).await?;

        let Some(latest) = notes.iter().max_by_key(|n| n.created_at_ms) else {
            debug!(escrow = %escrow_address, "No notes yet, keeping cached position");
            return Ok(());
        };

        let position = CollateralPosition::from_note(latest, now_ms());

        if let Some(previous) = self.positions.get(escrow_address) {
            let changed = previous.collateral_amount != position.collateral_amount
                || previous.debt_amount != position.debt_amount
                || previous.collateral_asset != position.collateral_asset;

            if changed {
                info!(
                    escrow = %escrow_address,
                    collateral_from = previous.collateral_amount,
                    collateral_to = position.collateral_amount,
                    debt_from = previous.debt_amount,
                    debt_to = position.debt_amount,
                    asset = %position.collateral_asset,
                    "Position changed"
                );
            }
        } else {
            info!(
                escrow = %escrow_address,
                collateral = position.collateral_amount,
                debt = position.debt_amount,
                asset = %position.collateral_asset,
                "Position tracked"
            );
        }

        self.positions.upsert(position);
        self.engine.notify(EngineEvent::PositionSynced {
            escrow_address: escrow_address.to_string(),
        });
        Ok(())
    }

    /// On-demand out-of-band resync (administrative trigger).
    pub async fn force_sync_escrow(&self, escrow_address: &str) -> Result<(), MonitorError> {
        if !self.registry.contains(escrow_address) {
            return Err(MonitorError::not_found(format!(
                "escrow {} is not registered",
                escrow_address
            )));
        }
        self.sync_one(escrow_address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EscrowAccount, EscrowKind};
    use monitor_ledger::mock::MockNoteProvider;
    use monitor_ledger::Note;
    use tokio::sync::mpsc;

    fn escrow(address: &str) -> EscrowAccount {
        EscrowAccount {
            address: address.into(),
            kind: EscrowKind::Lending,
            pool_address: "0xpool".into(),
            collateral_token: "ETH".into(),
            debt_token: "USDC".into(),
            registered_at_ms: 0,
        }
    }

    fn note(escrow: &str, collateral: f64, debt: f64, created_at_ms: u64) -> Note {
        Note {
            escrow_address: escrow.into(),
            collateral_asset: "ETH".into(),
            collateral_amount: collateral,
            debt_asset: "USDC".into(),
            debt_amount: debt,
            pool_id: "pool-1".into(),
            created_at_ms,
        }
    }

    fn service() -> (
        PositionSyncService,
        Arc<MockNoteProvider>,
        Arc<EscrowRegistry>,
        Arc<PositionStore>,
        mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        let notes = Arc::new(MockNoteProvider::new());
        let registry = Arc::new(EscrowRegistry::new(100));
        let positions = Arc::new(PositionStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let service = PositionSyncService::new(
            notes.clone(),
            registry.clone(),
            positions.clone(),
            EngineHandle::from_sender(tx),
        );
        (service, notes, registry, positions, rx)
    }

    #[tokio::test]
    async fn decodes_latest_note_and_notifies() {
        let (service, notes, registry, positions, mut rx) = service();
        registry.register(escrow("0xa")).unwrap();
        notes.push_note(note("0xa", 10.0, 500.0, 1));
        notes.push_note(note("0xa", 8.0, 450.0, 2));

        service.sync_one("0xa").await.unwrap();

        let pos = positions.get("0xa").unwrap();
        assert_eq!(pos.collateral_amount, 8.0);
        assert_eq!(pos.debt_amount, 450.0);
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::PositionSynced { escrow_address: "0xa".into() }
        );
    }

    #[tokio::test]
    async fn empty_notes_keep_cached_position() {
        let (service, notes, registry, positions, _rx) = service();
        registry.register(escrow("0xa")).unwrap();
        notes.push_note(note("0xa", 10.0, 500.0, 1));
        service.sync_one("0xa").await.unwrap();

        // Transient empty read must not destroy the last-known state.
        notes.clear_notes("0xa");
        service.sync_one("0xa").await.unwrap();

        let pos = positions.get("0xa").unwrap();
        assert_eq!(pos.collateral_amount, 10.0);
    }

    #[tokio::test]
    async fn one_failing_escrow_does_not_abort_the_cycle() {
        let (service, notes, registry, positions, _rx) = service();
        for addr in ["0xa", "0xb", "0xc"] {
            registry.register(escrow(addr)).unwrap();
        }
        notes.push_note(note("0xa", 1.0, 10.0, 1));
        notes.push_note(note("0xb", 2.0, 20.0, 1));
        notes.push_note(note("0xc", 3.0, 30.0, 1));
        notes.fail_account("0xb");

        service.sync_all().await;

        assert!(positions.get("0xa").is_some());
        assert!(positions.get("0xb").is_none());
        assert!(positions.get("0xc").is_some());
    }

    #[tokio::test]
    async fn last_updated_is_monotonic() {
        let (service, notes, registry, positions, _rx) = service();
        registry.register(escrow("0xa")).unwrap();
        notes.push_note(note("0xa", 10.0, 500.0, 1));

        service.sync_one("0xa").await.unwrap();
        let first = positions.get("0xa").unwrap().last_updated_ms;

        service.sync_one("0xa").await.unwrap();
        let second = positions.get("0xa").unwrap().last_updated_ms;
        assert!(second >= first);
    }

    #[tokio::test]
    async fn force_sync_requires_registration() {
        let (service, _notes, _registry, _positions, _rx) = service();
        let err = service.force_sync_escrow("0xmissing").await.unwrap_err();
        assert!(matches!(err, MonitorError::NotFound(_)));
    }
}
