// ─────────────────────────────────────────────────────────────────────────────
// trade-manager: per-user automated spot trading engine.
//
// Two independently-paced cycles drive the engine:
//   check_strategy_signals  — cancel stale buys, evaluate strategy sells,
//                              scan for and assign new buy opportunities.
//   update_running_trades   — reconcile fills, evaluate stop/ROI/trailing
//                              sell conditions on held positions.
// ─────────────────────────────────────────────────────────────────────────────
mod config;
mod domain;
mod orchestrator;
mod ports;
mod pricing;
mod reconciler;
mod scanner;
mod sell_decision;

use std::sync::Arc;

use config::TradeManagerConfig;
use orchestrator::CycleOrchestrator;
use ports::exchange::SimExchange;
use ports::notification::{NullNotifier, Notifier, RedisNotifier};
use ports::persistence::InMemoryStore;
use ports::strategy::{FixedAdviceStrategy, TradeAdvice};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("trade-manager starting…");

    let config = TradeManagerConfig::from_env();
    log::info!(
        "  Dry run:          {}",
        if config.is_dry_running { "ON (no real orders)" } else { "⚠️  LIVE!" }
    );
    log::info!("  Quote currency:   {}", config.quote_currency);
    log::info!("  Max traders:      {}", config.max_concurrent_trades);

    // Exchange and strategy are always the in-memory stand-ins here: wiring
    // a real venue client or strategy backend means providing a type that
    // implements `ExchangeClient`/`Strategy` in place of these.
    let exchange = SimExchange::new();
    let strategy = FixedAdviceStrategy::new("default", TradeAdvice::Hold);
    let store = InMemoryStore::new();

    let redis_url = std::env::var("TM_REDIS_URL").ok();
    let notifier: Box<dyn Notifier> = match redis_url {
        Some(url) => match RedisNotifier::new(&url, "trade-manager:notifications") {
            Ok(n) => Box::new(n),
            Err(e) => {
                log::warn!("redis notifier unavailable ({}), falling back to null sink", e);
                Box::new(NullNotifier)
            }
        },
        None => Box::new(NullNotifier),
    };

    let orchestrator = Arc::new(CycleOrchestrator::new(
        config,
        Box::new(exchange),
        Box::new(strategy),
        Box::new(store),
        notifier,
    ));

    let signals_orchestrator = orchestrator.clone();
    let signals_task = tokio::spawn(async move {
        loop {
            if let Err(e) = signals_orchestrator.check_strategy_signals().await {
                log::error!("check_strategy_signals failed: {}", e);
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
        }
    });

    let running_trades_orchestrator = orchestrator.clone();
    let running_trades_task = tokio::spawn(async move {
        loop {
            if let Err(e) = running_trades_orchestrator.update_running_trades().await {
                log::error!("update_running_trades failed: {}", e);
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(10)).await;
        }
    });

    log::info!("both cycles running. entering idle wait…");
    let _ = tokio::join!(signals_task, running_trades_task);
}
