// sell_decision.rs — the sell-decision engine (spec.md §4.8).
//
// Grounded on the teacher's exchange.rs::Position (is_sl_hit / is_tp_hit /
// is_time_stop_hit), generalized to the pure sum-type shape spec.md §9
// recommends in place of the mutate-and-signal original: `should_sell` never
// touches the trade, it only says what the caller should do with it.
use chrono::{DateTime, Utc};

use crate::config::TradeManagerConfig;
use crate::domain::{SellType, Trade};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    NoOp,
    UpdateStop(f64),
    Sell(SellType),
}

fn profit(open_rate: f64, current_bid: f64) -> f64 {
    (current_bid - open_rate) / open_rate
}

/// Pure function of (trade, current_bid, now); never mutates `trade`. The
/// caller applies `UpdateStop` by writing `stop_loss_rate` and persisting.
pub fn should_sell(
    config: &TradeManagerConfig,
    trade: &Trade,
    current_bid: f64,
    now: DateTime<Utc>,
) -> Decision {
    let profit = profit(trade.open_rate, current_bid);

    if profit < config.stop_loss_percentage {
        return Decision::Sell(SellType::StopLoss);
    }

    let elapsed_minutes = (now - trade.open_date).num_seconds() as f64 / 60.0;
    for step in &config.return_on_investment {
        if elapsed_minutes > step.duration_minutes as f64 && profit > step.profit_threshold {
            return Decision::Sell(SellType::Timed);
        }
    }

    if config.enable_trailing_stop {
        if let Some(stop_loss_rate) = trade.stop_loss_rate {
            if current_bid < stop_loss_rate {
                return Decision::Sell(SellType::TrailingStopLoss);
            }
        }

        let new_stop = trade.open_rate * (1.0 + (profit - config.trailing_stop_percentage));
        let should_raise = trade.stop_loss_rate.map(|existing| existing < new_stop).unwrap_or(true);
        if profit > config.trailing_stop_starting_percentage && should_raise {
            return Decision::UpdateStop(new_stop);
        }
    }

    Decision::NoOp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Trade;

    fn trade_at(open_rate: f64, open_date: DateTime<Utc>, stop_loss_rate: Option<f64>) -> Trade {
        let mut trade = Trade::new_buying(
            "trader-1".to_string(),
            "ETH/BTC".to_string(),
            0.01,
            open_rate,
            0.01 / open_rate,
            "buy-1".to_string(),
            "always-buy".to_string(),
            open_date,
        );
        trade.is_buying = false;
        trade.open_order_id = None;
        trade.stop_loss_rate = stop_loss_rate;
        trade
    }

    #[test]
    fn stop_loss_triggers_below_threshold() {
        let config = TradeManagerConfig::default();
        let trade = trade_at(0.0500, Utc::now(), None);
        let decision = should_sell(&config, &trade, 0.0440, Utc::now());
        assert_eq!(decision, Decision::Sell(SellType::StopLoss));
    }

    #[test]
    fn roi_ladder_fires_first_matching_step_in_order() {
        let config = TradeManagerConfig::default();
        let open_date = Utc::now() - chrono::Duration::minutes(45);
        let trade = trade_at(0.0500, open_date, None);
        // 45 minutes elapsed: the 30-minute/5% step matches before the 60-minute step.
        let decision = should_sell(&config, &trade, 0.0500 * 1.06, Utc::now());
        assert_eq!(decision, Decision::Sell(SellType::Timed));
    }

    #[test]
    fn trailing_stop_loss_triggers_when_bid_drops_below_recorded_stop() {
        let mut config = TradeManagerConfig::default();
        config.enable_trailing_stop = true;
        let trade = trade_at(0.0500, Utc::now(), Some(0.0510));
        let decision = should_sell(&config, &trade, 0.0505, Utc::now());
        assert_eq!(decision, Decision::Sell(SellType::TrailingStopLoss));
    }

    #[test]
    fn trailing_stop_raises_without_signalling_a_sell() {
        let mut config = TradeManagerConfig::default();
        config.enable_trailing_stop = true;
        config.trailing_stop_starting_percentage = 0.02;
        config.trailing_stop_percentage = 0.01;
        let trade = trade_at(0.0500, Utc::now(), None);
        let decision = should_sell(&config, &trade, 0.0500 * 1.05, Utc::now());
        match decision {
            Decision::UpdateStop(rate) => assert!(rate > 0.0500),
            other => panic!("expected UpdateStop, got {:?}", other),
        }
    }

    #[test]
    fn no_decision_when_nothing_triggers() {
        let config = TradeManagerConfig::default();
        let trade = trade_at(0.0500, Utc::now(), None);
        let decision = should_sell(&config, &trade, 0.0501, Utc::now());
        assert_eq!(decision, Decision::NoOp);
    }
}
