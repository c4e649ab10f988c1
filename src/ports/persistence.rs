// ports/persistence.rs — the persistence port (spec.md §6).
//
// Generalizes the teacher's persistence.rs (whole-file JSON load_state/
// save_state) into query-by-predicate + per-table batched upsert, matching
// the two tables ("TRADE", "TRADER") spec.md §3 describes.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{Trade, TradeId, Trader, TraderId};

#[derive(Debug, Clone)]
pub enum StoreError {
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Backend(s) => write!(f, "persistence backend error: {}", s),
        }
    }
}
impl std::error::Error for StoreError {}

pub type TradePredicate = Box<dyn Fn(&Trade) -> bool + Send + Sync>;
pub type TraderPredicate = Box<dyn Fn(&Trader) -> bool + Send + Sync>;

pub enum BatchOp<T> {
    Insert(T),
    Replace(T),
}

/// A table's worth of pending writes, accumulated during one cycle and
/// flushed atomically at the end (spec.md §4.1).
#[derive(Default)]
pub struct Batch<T> {
    ops: Vec<BatchOp<T>>,
}

impl<T> Batch<T> {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn add(&mut self, op: BatchOp<T>) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp<T>> {
        self.ops
    }
}

#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn query_trades(&self, predicate: TradePredicate) -> Result<Vec<Trade>, StoreError>;
    async fn query_traders(&self, predicate: TraderPredicate) -> Result<Vec<Trader>, StoreError>;

    async fn execute_trades(&self, batch: Batch<Trade>) -> Result<(), StoreError>;
    async fn execute_traders(&self, batch: Batch<Trader>) -> Result<(), StoreError>;

    /// Single-row, immediate write outside the batch — used only by
    /// cancel-stale-buys (spec.md §4.2) so the free-trader scan in the same
    /// cycle observes the release.
    async fn replace_trader_immediate(&self, trader: Trader) -> Result<(), StoreError>;
}

/// In-memory implementation, grounded on the teacher's EngineState — a
/// single `Mutex`-guarded map standing in for a durable KV table.
pub struct InMemoryStore {
    trades: Mutex<HashMap<TradeId, Trade>>,
    traders: Mutex<HashMap<TraderId, Trader>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self { trades: Mutex::new(HashMap::new()), traders: Mutex::new(HashMap::new()) }
    }

    pub fn trader_count(&self) -> usize {
        self.traders.lock().unwrap().len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn query_trades(&self, predicate: TradePredicate) -> Result<Vec<Trade>, StoreError> {
        Ok(self.trades.lock().unwrap().values().filter(|t| predicate(t)).cloned().collect())
    }

    async fn query_traders(&self, predicate: TraderPredicate) -> Result<Vec<Trader>, StoreError> {
        Ok(self.traders.lock().unwrap().values().filter(|t| predicate(t)).cloned().collect())
    }

    async fn execute_trades(&self, batch: Batch<Trade>) -> Result<(), StoreError> {
        let mut trades = self.trades.lock().unwrap();
        for op in batch.into_ops() {
            match op {
                BatchOp::Insert(t) | BatchOp::Replace(t) => {
                    trades.insert(t.id.clone(), t);
                }
            }
        }
        Ok(())
    }

    async fn execute_traders(&self, batch: Batch<Trader>) -> Result<(), StoreError> {
        let mut traders = self.traders.lock().unwrap();
        for op in batch.into_ops() {
            match op {
                BatchOp::Insert(t) | BatchOp::Replace(t) => {
                    traders.insert(t.id.clone(), t);
                }
            }
        }
        Ok(())
    }

    async fn replace_trader_immediate(&self, trader: Trader) -> Result<(), StoreError> {
        self.traders.lock().unwrap().insert(trader.id.clone(), trader);
        Ok(())
    }
}
