//! In-memory collaborator implementations.
//!
//! The reference deployment runs against these; tests use them as fakes. Each
//! mock supports failure injection so per-item isolation paths can be exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tracing::debug;

use crate::traits::{NoteProvider, OracleWriter, PriceSource, TxExecutor};
use crate::types::{LiquidationRequest, Note, TxReceipt};
use crate::{LedgerError, LedgerResult};

/// Price source seeded from a static map.
#[derive(Debug, Default)]
pub struct MockPriceSource {
    prices: DashMap<String, f64>,
    fail_next: AtomicBool,
}

impl MockPriceSource {
    /// Create a source with the given symbol -> price seed.
    pub fn new(seed: HashMap<String, f64>) -> Self {
        let prices = DashMap::new();
        for (symbol, price) in seed {
            prices.insert(symbol, price);
        }
        Self {
            prices,
            fail_next: AtomicBool::new(false),
        }
    }

    /// Overwrite the price returned for a symbol.
    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.insert(symbol.to_string(), price);
    }

    /// Make the next fetch fail with a connection error.
    pub fn fail_next_fetch(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch_prices(&self, symbols: &[String]) -> LedgerResult<HashMap<String, f64>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Connection("injected fetch failure".into()));
        }

        let mut out = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            let price = self
                .prices
                .get(symbol)
                .map(|p| *p)
                .ok_or_else(|| LedgerError::Protocol(format!("unknown symbol {}", symbol)))?;
            out.insert(symbol.clone(), price);
        }
        Ok(out)
    }
}

/// In-memory oracle contract.
#[derive(Debug, Default)]
pub struct MockOracle {
    onchain: DashMap<String, f64>,
    fail_next: AtomicBool,
    write_count: AtomicU64,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next write fail with a rejection.
    pub fn fail_next_write(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of successful on-chain writes so far.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OracleWriter for MockOracle {
    async fn update_price(&self, symbol: &str, price: f64) -> LedgerResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Rejected("injected write failure".into()));
        }

        self.onchain.insert(symbol.to_string(), price);
        self.write_count.fetch_add(1, Ordering::SeqCst);
        debug!(symbol, price, "Mock oracle updated");
        Ok(())
    }

    async fn get_price(&self, symbol: &str) -> LedgerResult<Option<f64>> {
        Ok(self.onchain.get(symbol).map(|p| *p))
    }
}

/// Note provider with per-account note queues.
#[derive(Debug, Default)]
pub struct MockNoteProvider {
    notes: DashMap<String, Vec<Note>>,
    failing_accounts: DashSet<String>,
    sync_count: AtomicU64,
}

impl MockNoteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a note to an account's queue.
    pub fn push_note(&self, note: Note) {
        self.notes
            .entry(note.escrow_address.clone())
            .or_default()
            .push(note);
    }

    /// Clear an account's notes (subsequent fetches return empty).
    pub fn clear_notes(&self, escrow_address: &str) {
        self.notes.remove(escrow_address);
    }

    /// Make every call for this account fail until unset.
    pub fn fail_account(&self, escrow_address: &str) {
        self.failing_accounts.insert(escrow_address.to_string());
    }

    /// Number of sync_account calls observed.
    pub fn sync_count(&self) -> u64 {
        self.sync_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NoteProvider for MockNoteProvider {
    async fn sync_account(&self, escrow_address: &str) -> LedgerResult<()> {
        if self.failing_accounts.contains(escrow_address) {
            return Err(LedgerError::Connection(format!(
                "injected sync failure for {}",
                escrow_address
            )));
        }
        self.sync_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_notes(&self, escrow_address: &str) -> LedgerResult<Vec<Note>> {
        if self.failing_accounts.contains(escrow_address) {
            return Err(LedgerError::Connection(format!(
                "injected fetch failure for {}",
                escrow_address
            )));
        }
        Ok(self
            .notes
            .get(escrow_address)
            .map(|n| n.clone())
            .unwrap_or_default())
    }
}

/// Transaction executor issuing deterministic receipts.
#[derive(Debug, Default)]
pub struct MockTxExecutor {
    submitted: DashMap<String, Vec<LiquidationRequest>>,
    fail_next: AtomicBool,
    nonce: AtomicU64,
}

impl MockTxExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next submission fail with a revert.
    pub fn fail_next_submission(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Submissions recorded for an escrow.
    pub fn submissions_for(&self, escrow_address: &str) -> Vec<LiquidationRequest> {
        self.submitted
            .get(escrow_address)
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TxExecutor for MockTxExecutor {
    async fn submit_liquidation(&self, request: &LiquidationRequest) -> LedgerResult<TxReceipt> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Rejected(
                "injected revert: insufficient collateral".into(),
            ));
        }

        self.submitted
            .entry(request.escrow_address.clone())
            .or_default()
            .push(request.clone());

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        Ok(TxReceipt {
            tx_hash: format!("0xmock{:016x}", nonce),
            block_number: nonce + 1,
        })
    }
}
