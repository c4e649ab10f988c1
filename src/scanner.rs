// scanner.rs — the buy-opportunity scanner (spec.md §4.4).
//
// Per-market strategy evaluation is sequential, in descending-volume order,
// one candidate at a time. spec.md §5 would permit evaluating markets
// concurrently as long as results are merged back in that order; this
// implementation doesn't take that option.
use std::collections::HashSet;

use crate::config::TradeManagerConfig;
use crate::ports::exchange::{ExchangeClient, ExchangeError, MarketSummary};
use crate::ports::strategy::{Strategy, TradeAdvice};

/// Markets eligible for a new buy this cycle, in descending-volume order.
pub async fn scan_for_buy_opportunities(
    config: &TradeManagerConfig,
    exchange: &dyn ExchangeClient,
    strategy: &dyn Strategy,
    active_markets: &HashSet<String>,
) -> Result<Vec<String>, ExchangeError> {
    let mut summaries = exchange.get_market_summaries().await?;

    summaries.retain(|s| eligible(config, s, active_markets));
    summaries.sort_by(|a, b| b.base_volume.partial_cmp(&a.base_volume).unwrap_or(std::cmp::Ordering::Equal));

    let mut candidates = Vec::new();
    for summary in &summaries {
        let candles = exchange
            .get_ticker_history(
                &summary.market_name,
                strategy.minimum_date_time(chrono::Utc::now()),
                strategy.ideal_period(),
            )
            .await?;
        if strategy.forecast(&candles).await.trade_advice == TradeAdvice::Buy {
            candidates.push(summary.market_name.clone());
        }
    }

    Ok(candidates)
}

fn eligible(config: &TradeManagerConfig, summary: &MarketSummary, active_markets: &HashSet<String>) -> bool {
    if summary.currency_pair.quote.to_uppercase() != config.quote_currency {
        return false;
    }
    let base = summary.currency_pair.base.to_uppercase();
    let volume_ok = summary.base_volume >= config.minimum_volume || config.always_trade_list.contains(&base);
    if !volume_ok {
        return false;
    }
    if active_markets.contains(&summary.market_name) {
        return false;
    }
    if config.market_blacklist.contains(&base) {
        return false;
    }
    true
}
