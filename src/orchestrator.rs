// orchestrator.rs — the cycle orchestrator (spec.md §4.1).
//
// Grounded on the teacher's exec_engine: Arc<AsyncMutex<MmExecutionEngine>>
// wrapping the single mutable owner of trading state, entered once per tick
// from main's spawned loops. Here the two entry points share one
// `tokio::sync::Mutex` guard instead of wrapping the whole engine, since the
// ports themselves are already internally synchronized.
use tokio::sync::Mutex;

use crate::config::TradeManagerConfig;
use crate::domain::{Trader, TRADER_PARTITION};
use crate::ports::exchange::{ExchangeClient, ExchangeError};
use crate::ports::notification::Notifier;
use crate::ports::persistence::{Batch, BatchOp, PersistenceStore};
use crate::ports::strategy::Strategy;
use crate::reconciler;

pub struct CycleOrchestrator {
    config: TradeManagerConfig,
    exchange: Box<dyn ExchangeClient>,
    strategy: Box<dyn Strategy>,
    store: Box<dyn PersistenceStore>,
    notifier: Box<dyn Notifier>,
    cycle_lock: Mutex<()>,
}

impl CycleOrchestrator {
    pub fn new(
        config: TradeManagerConfig,
        exchange: Box<dyn ExchangeClient>,
        strategy: Box<dyn Strategy>,
        store: Box<dyn PersistenceStore>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self { config, exchange, strategy, store, notifier, cycle_lock: Mutex::new(()) }
    }

    /// Inserts N = `max_concurrent_trades` traders if the trader table is
    /// still empty. Idempotent only under the single-writer assumption
    /// spec.md §4.1 documents; not safe across racing instances.
    async fn bootstrap_traders_if_empty(&self) -> Result<(), ExchangeError> {
        let existing = self
            .store
            .query_traders(Box::new(|_| true))
            .await
            .map_err(|e| ExchangeError::Unknown(e.to_string()))?;
        if !existing.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now();
        let mut batch = Batch::new();
        for i in 0..self.config.max_concurrent_trades {
            let id = format!("{}-{}", TRADER_PARTITION, i);
            batch.add(BatchOp::Insert(Trader::new(id, self.config.stake_per_trader, now)));
        }
        self.store
            .execute_traders(batch)
            .await
            .map_err(|e| ExchangeError::Unknown(e.to_string()))
    }

    async fn load_active_trades(&self) -> Result<Vec<crate::domain::Trade>, ExchangeError> {
        self.store
            .query_trades(Box::new(|t| t.is_open))
            .await
            .map_err(|e| ExchangeError::Unknown(e.to_string()))
    }

    async fn load_traders(&self) -> Result<Vec<Trader>, ExchangeError> {
        self.store
            .query_traders(Box::new(|_| true))
            .await
            .map_err(|e| ExchangeError::Unknown(e.to_string()))
    }

    /// spec.md §4.1 `check_strategy_signals` ordering: cancel stale buys,
    /// evaluate strategy sells on held positions, scan and assign new buys,
    /// flush.
    pub async fn check_strategy_signals(&self) -> Result<(), ExchangeError> {
        let _guard = self.cycle_lock.lock().await;
        self.bootstrap_traders_if_empty().await?;

        let trades = self.load_active_trades().await?;

        let mut trade_batch = Batch::new();
        let mut trader_batch = Batch::new();

        if self.config.cancel_unbought_each_cycle {
            reconciler::cancel_stale_buys(
                self.exchange.as_ref(),
                self.store.as_ref(),
                self.notifier.as_ref(),
                &mut trade_batch,
                &trades,
            )
            .await?;
        }

        // Re-read after cancel_stale_buys: it writes trader releases
        // immediately (not via trader_batch) so this scan must observe them.
        let traders = self.load_traders().await?;

        reconciler::sell_on_strategy(
            &self.config,
            self.exchange.as_ref(),
            self.strategy.as_ref(),
            self.notifier.as_ref(),
            &mut trade_batch,
            &trades,
        )
        .await?;

        let active_markets: std::collections::HashSet<String> =
            trades.iter().filter(|t| t.is_open).map(|t| t.market.clone()).collect();
        let candidates = crate::scanner::scan_for_buy_opportunities(
            &self.config,
            self.exchange.as_ref(),
            self.strategy.as_ref(),
            &active_markets,
        )
        .await?;

        let mut free_traders: Vec<Trader> = traders.into_iter().filter(|t| !t.is_busy).collect();
        for market in candidates {
            let trader = match free_traders.pop() {
                Some(t) => t,
                None => break,
            };
            reconciler::open_new_trade(
                &self.config,
                self.exchange.as_ref(),
                self.notifier.as_ref(),
                &mut trade_batch,
                &mut trader_batch,
                &trader,
                &market,
                self.strategy.name(),
            )
            .await?;
        }

        self.flush(trade_batch, trader_batch).await
    }

    /// spec.md §4.1 `update_running_trades` ordering: reconcile buy orders,
    /// reconcile sell orders, evaluate sell conditions, flush.
    pub async fn update_running_trades(&self) -> Result<(), ExchangeError> {
        let _guard = self.cycle_lock.lock().await;

        let trades = self.load_active_trades().await?;
        let traders = self.load_traders().await?;

        let mut trade_batch = Batch::new();
        let mut trader_batch = Batch::new();

        reconciler::reconcile_buy_orders(
            &self.config,
            self.exchange.as_ref(),
            self.notifier.as_ref(),
            &mut trade_batch,
            &trades,
        )
        .await?;

        reconciler::reconcile_sell_orders(
            self.exchange.as_ref(),
            self.notifier.as_ref(),
            &mut trade_batch,
            &mut trader_batch,
            &trades,
            &traders,
        )
        .await?;

        reconciler::check_for_sell(
            &self.config,
            self.exchange.as_ref(),
            self.notifier.as_ref(),
            &mut trade_batch,
            &trades,
        )
        .await?;

        self.flush(trade_batch, trader_batch).await
    }

    async fn flush(
        &self,
        trade_batch: Batch<crate::domain::Trade>,
        trader_batch: Batch<Trader>,
    ) -> Result<(), ExchangeError> {
        if !trade_batch.is_empty() {
            self.store
                .execute_trades(trade_batch)
                .await
                .map_err(|e| ExchangeError::Unknown(e.to_string()))?;
        }
        if !trader_batch.is_empty() {
            self.store
                .execute_traders(trader_batch)
                .await
                .map_err(|e| ExchangeError::Unknown(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::exchange::{SimExchange, Ticker};
    use crate::ports::notification::NullNotifier;
    use crate::ports::persistence::InMemoryStore;
    use crate::ports::strategy::{FixedAdviceStrategy, TradeAdvice};

    fn orchestrator(config: TradeManagerConfig, exchange: SimExchange, advice: TradeAdvice) -> CycleOrchestrator {
        CycleOrchestrator::new(
            config,
            Box::new(exchange),
            Box::new(FixedAdviceStrategy::new("fixed", advice)),
            Box::new(InMemoryStore::new()),
            Box::new(NullNotifier),
        )
    }

    #[tokio::test]
    async fn check_strategy_signals_bootstraps_traders_on_first_run() {
        let mut config = TradeManagerConfig::default();
        config.max_concurrent_trades = 2;
        let orchestrator = orchestrator(config, SimExchange::new(), TradeAdvice::Hold);

        orchestrator.check_strategy_signals().await.unwrap();
        let traders = orchestrator.load_traders().await.unwrap();
        assert_eq!(traders.len(), 2);
        assert!(traders.iter().all(|t| !t.is_busy));
    }

    #[tokio::test]
    async fn check_strategy_signals_assigns_a_free_trader_to_a_buy_candidate() {
        let mut config = TradeManagerConfig::default();
        config.max_concurrent_trades = 1;
        config.quote_currency = "BTC".to_string();
        config.minimum_volume = 1.0;

        let exchange = SimExchange::new();
        exchange.set_balance("BTC", 1.0);
        exchange.set_ticker("ETH/BTC", Ticker { bid: 0.05, ask: 0.0505, last: 0.0501 });
        *exchange.summaries.lock().unwrap() = vec![crate::ports::exchange::MarketSummary {
            market_name: "ETH/BTC".to_string(),
            base_volume: 50.0,
            currency_pair: crate::ports::exchange::CurrencyPair {
                base: "ETH".to_string(),
                quote: "BTC".to_string(),
            },
        }];

        let orchestrator = orchestrator(config, exchange, TradeAdvice::Buy);
        orchestrator.check_strategy_signals().await.unwrap();

        let traders = orchestrator.load_traders().await.unwrap();
        assert!(traders.iter().any(|t| t.is_busy));

        let trades = orchestrator.load_active_trades().await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].market, "ETH/BTC");
    }
}
