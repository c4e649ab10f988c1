// reconciler.rs — per-trade operations the orchestrator drives each cycle:
// cancel-stale-buys (§4.2), sell-on-strategy (§4.3), open-new-trade (§4.5),
// buy-order reconciliation (§4.7), check-for-sell (§4.9), sell-order
// reconciliation (§4.10).
//
// Grounded on the teacher's InternalInventory::reconcile (execution.rs),
// which diffs internal state against live exchange state and folds the
// difference back in; here each function does the same for one trade at a
// time, accumulating writes into the caller-owned batches rather than
// mutating shared state directly.
use chrono::Utc;

use crate::config::TradeManagerConfig;
use crate::domain::{SellType, Trade, Trader};
use crate::ports::exchange::{ExchangeClient, ExchangeError, OrderStatus};
use crate::ports::notification::{Notification, Notifier};
use crate::ports::persistence::{Batch, BatchOp, PersistenceStore};
use crate::ports::strategy::{Strategy, TradeAdvice};
use crate::pricing::target_bid;
use crate::sell_decision::{should_sell, Decision};

fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

/// Routes a buy through the real exchange, or logs it and synthesizes an
/// order id when `config.is_dry_running` is set.
async fn place_buy(
    config: &TradeManagerConfig,
    exchange: &dyn ExchangeClient,
    market: &str,
    qty: f64,
    price: f64,
) -> Result<String, ExchangeError> {
    if config.is_dry_running {
        let order_id = format!("dry-run-buy-{}-{}", market.replace('/', "-"), Utc::now().timestamp_millis());
        log::info!("[DRY RUN] buy {} qty={} price={} -> {}", market, qty, price, order_id);
        Ok(order_id)
    } else {
        exchange.buy(market, qty, price).await
    }
}

/// Routes a sell through the real exchange, or logs it and synthesizes an
/// order id when `config.is_dry_running` is set.
async fn place_sell(
    config: &TradeManagerConfig,
    exchange: &dyn ExchangeClient,
    market: &str,
    qty: f64,
    price: f64,
) -> Result<String, ExchangeError> {
    if config.is_dry_running {
        let order_id = format!("dry-run-sell-{}-{}", market.replace('/', "-"), Utc::now().timestamp_millis());
        log::info!("[DRY RUN] sell {} qty={} price={} -> {}", market, qty, price, order_id);
        Ok(order_id)
    } else {
        exchange.sell(market, qty, price).await
    }
}

/// spec.md §4.2. Scope: `is_buying`. Trader release is written immediately
/// (not batched) so the same cycle's free-trader scan observes it.
pub async fn cancel_stale_buys(
    exchange: &dyn ExchangeClient,
    store: &dyn PersistenceStore,
    notifier: &dyn Notifier,
    trade_batch: &mut Batch<Trade>,
    trades: &[Trade],
) -> Result<(), ExchangeError> {
    for trade in trades.iter().filter(|t| t.is_buying) {
        let order_id = match &trade.open_order_id {
            Some(id) => id,
            None => continue,
        };
        let order = exchange.get_order(order_id, &trade.market).await?;
        if order.status == OrderStatus::PartiallyFilled {
            continue;
        }

        exchange.cancel_order(order_id, &trade.market).await?;

        let mut updated = trade.clone();
        updated.is_buying = false;
        updated.is_open = false;
        updated.sell_type = SellType::Cancelled;
        updated.close_date = Some(Utc::now());
        updated.open_order_id = None;
        trade_batch.add(BatchOp::Replace(updated));

        if let Ok(mut owners) = store.query_traders(Box::new({
            let trader_id = trade.trader_id.clone();
            move |t: &Trader| t.id == trader_id
        })).await {
            if let Some(mut trader) = owners.pop() {
                trader.is_busy = false;
                trader.last_updated = Utc::now();
                let _ = store.replace_trader_immediate(trader).await;
            }
        }

        notifier.send(Notification::OrderCancelled { market: trade.market.clone() }).await;
    }
    Ok(())
}

/// spec.md §4.3. Scope: held positions, or positions with an overridable
/// immediate sell.
pub async fn sell_on_strategy(
    config: &TradeManagerConfig,
    exchange: &dyn ExchangeClient,
    strategy: &dyn Strategy,
    notifier: &dyn Notifier,
    trade_batch: &mut Batch<Trade>,
    trades: &[Trade],
) -> Result<(), ExchangeError> {
    for trade in trades.iter().filter(|t| t.eligible_for_sell_evaluation()) {
        let candles = exchange
            .get_ticker_history(&trade.market, strategy.minimum_date_time(Utc::now()), strategy.ideal_period())
            .await?;
        if strategy.forecast(&candles).await.trade_advice != TradeAdvice::Sell {
            continue;
        }

        if trade.is_selling && trade.sell_type == SellType::Immediate {
            if let Some(order_id) = &trade.sell_order_id {
                exchange.cancel_order(order_id, &trade.market).await?;
            }
        }

        let ticker = exchange.get_ticker(&trade.market).await?;
        let order_id = place_sell(config, exchange, &trade.market, trade.quantity, ticker.bid).await?;

        let mut updated = trade.clone();
        updated.close_rate = Some(ticker.bid);
        updated.open_order_id = Some(order_id.clone());
        updated.sell_order_id = Some(order_id);
        updated.sell_type = SellType::Strategy;
        updated.is_selling = true;
        trade_batch.add(BatchOp::Replace(updated));

        notifier
            .send(Notification::SellPlaced { market: trade.market.clone(), trade_id: trade.id.clone() })
            .await;
    }
    Ok(())
}

/// spec.md §4.5. One free trader, one candidate market.
pub async fn open_new_trade(
    config: &TradeManagerConfig,
    exchange: &dyn ExchangeClient,
    notifier: &dyn Notifier,
    trade_batch: &mut Batch<Trade>,
    trader_batch: &mut Batch<Trader>,
    trader: &Trader,
    market: &str,
    strategy_used: &str,
) -> Result<(), ExchangeError> {
    let available = exchange.get_balance(&config.quote_currency).await?;
    if available.available < trader.current_balance {
        return Err(ExchangeError::InsufficientFunds(format!(
            "available {} < trader balance {}",
            available.available, trader.current_balance
        )));
    }

    let spend = trader.current_balance.min(config.stake_per_trader);
    let ticker = exchange.get_ticker(market).await?;
    let open_rate = target_bid(config, &ticker);
    let gross_quantity = spend / open_rate;
    let net_quantity = (spend * (1.0 - config.fee_percentage)) / open_rate;

    let order_id = place_buy(config, exchange, market, gross_quantity, open_rate).await?;
    notifier.send(Notification::TradeOpened { market: market.to_string(), trade_id: order_id.clone() }).await;

    let now = Utc::now();
    let trade = Trade::new_buying(
        trader.id.clone(),
        market.to_string(),
        spend,
        open_rate,
        net_quantity,
        order_id,
        strategy_used.to_string(),
        now,
    );
    trade_batch.add(BatchOp::Insert(trade));

    let mut updated_trader = trader.clone();
    updated_trader.is_busy = true;
    updated_trader.last_updated = now;
    trader_batch.add(BatchOp::Replace(updated_trader));

    Ok(())
}

/// spec.md §4.7. Scope: `open_order_id != null ∧ sell_order_id == null`.
pub async fn reconcile_buy_orders(
    config: &TradeManagerConfig,
    exchange: &dyn ExchangeClient,
    notifier: &dyn Notifier,
    trade_batch: &mut Batch<Trade>,
    trades: &[Trade],
) -> Result<(), ExchangeError> {
    for trade in trades.iter().filter(|t| t.open_order_id.is_some() && t.sell_order_id.is_none()) {
        let order_id = trade.open_order_id.as_ref().unwrap();
        let order = exchange.get_order(order_id, &trade.market).await?;
        if order.status != OrderStatus::Filled {
            continue;
        }

        let mut updated = trade.clone();
        updated.stake_amount = order.original_quantity * order.price;
        updated.quantity = order.original_quantity;
        updated.open_rate = order.price;
        updated.open_date = order.time;
        updated.is_buying = false;
        updated.open_order_id = None;

        if config.immediately_place_sell_order {
            let sell_price = round8(updated.open_rate * (1.0 + config.immediately_place_sell_order_at_profit));
            let sell_order_id = place_sell(config, exchange, &trade.market, updated.quantity, sell_price).await?;
            updated.close_rate = Some(sell_price);
            updated.open_order_id = Some(sell_order_id.clone());
            updated.sell_order_id = Some(sell_order_id);
            updated.is_selling = true;
            updated.sell_type = SellType::Immediate;
        }

        trade_batch.add(BatchOp::Replace(updated));
        notifier
            .send(Notification::TradeOpened { market: trade.market.clone(), trade_id: trade.id.clone() })
            .await;
    }
    Ok(())
}

/// spec.md §4.9. Scope matches §4.3's scope.
pub async fn check_for_sell(
    config: &TradeManagerConfig,
    exchange: &dyn ExchangeClient,
    notifier: &dyn Notifier,
    trade_batch: &mut Batch<Trade>,
    trades: &[Trade],
) -> Result<(), ExchangeError> {
    for trade in trades.iter().filter(|t| t.eligible_for_sell_evaluation()) {
        let ticker = exchange.get_ticker(&trade.market).await?;
        let decision = should_sell(config, trade, ticker.bid, Utc::now());

        match decision {
            Decision::NoOp => {}
            Decision::UpdateStop(rate) => {
                let mut updated = trade.clone();
                updated.stop_loss_rate = Some(rate);
                trade_batch.add(BatchOp::Replace(updated));
            }
            Decision::Sell(sell_type) => {
                if trade.is_selling && trade.sell_type == SellType::Immediate {
                    if let Some(order_id) = &trade.sell_order_id {
                        exchange.cancel_order(order_id, &trade.market).await?;
                    }
                }
                let order_id = place_sell(config, exchange, &trade.market, trade.quantity, ticker.bid).await?;

                let mut updated = trade.clone();
                updated.close_rate = Some(ticker.bid);
                updated.open_order_id = Some(order_id.clone());
                updated.sell_order_id = Some(order_id);
                updated.sell_type = sell_type;
                updated.is_selling = true;
                trade_batch.add(BatchOp::Replace(updated));

                notifier
                    .send(Notification::SellPlaced { market: trade.market.clone(), trade_id: trade.id.clone() })
                    .await;
            }
        }
    }
    Ok(())
}

/// spec.md §4.10. Scope: `open_order_id != null ∧ sell_order_id != null`.
pub async fn reconcile_sell_orders(
    exchange: &dyn ExchangeClient,
    notifier: &dyn Notifier,
    trade_batch: &mut Batch<Trade>,
    trader_batch: &mut Batch<Trader>,
    trades: &[Trade],
    traders: &[Trader],
) -> Result<(), ExchangeError> {
    for trade in trades.iter().filter(|t| t.open_order_id.is_some() && t.sell_order_id.is_some()) {
        let order_id = trade.open_order_id.as_ref().unwrap();
        let order = exchange.get_order(order_id, &trade.market).await?;
        if order.status != OrderStatus::Filled {
            continue;
        }

        let close_profit = order.price * order.original_quantity - trade.stake_amount;
        let close_profit_percent = close_profit / trade.stake_amount * 100.0;

        let mut updated = trade.clone();
        updated.is_open = false;
        updated.is_selling = false;
        updated.open_order_id = None;
        updated.close_date = Some(order.time);
        updated.close_rate = Some(order.price);
        updated.close_profit = Some(close_profit);
        updated.close_profit_percent = Some(close_profit_percent);
        trade_batch.add(BatchOp::Replace(updated));

        if let Some(owner) = traders.iter().find(|t| t.id == trade.trader_id) {
            let mut updated_trader = owner.clone();
            updated_trader.current_balance += close_profit;
            updated_trader.is_busy = false;
            updated_trader.last_updated = Utc::now();
            trader_batch.add(BatchOp::Replace(updated_trader));
        }

        notifier
            .send(Notification::TradeClosed {
                market: trade.market.clone(),
                trade_id: trade.id.clone(),
                profit_percent: close_profit_percent / 100.0,
            })
            .await;
    }
    Ok(())
}
