// ports/strategy.rs — the Strategy port (spec.md §6).
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ports::exchange::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAdvice {
    Buy,
    Hold,
    Sell,
}

#[derive(Debug, Clone, Copy)]
pub struct Forecast {
    pub trade_advice: TradeAdvice,
}

#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;
    fn ideal_period(&self) -> &str;
    fn minimum_amount_of_candles(&self) -> usize;
    fn minimum_date_time(&self, now: DateTime<Utc>) -> DateTime<Utc>;
    fn current_candle_date_time(&self, now: DateTime<Utc>) -> DateTime<Utc>;
    fn signal_date(&self, now: DateTime<Utc>) -> DateTime<Utc>;

    async fn forecast(&self, candles: &[Candle]) -> Forecast;
}

/// A fixed-advice strategy, useful for wiring tests and demos the way the
/// teacher's `SimExchange` stands in for `LiveExchange`.
pub struct FixedAdviceStrategy {
    pub name: String,
    pub advice: TradeAdvice,
}

impl FixedAdviceStrategy {
    pub fn new(name: impl Into<String>, advice: TradeAdvice) -> Self {
        Self { name: name.into(), advice }
    }
}

#[async_trait]
impl Strategy for FixedAdviceStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn ideal_period(&self) -> &str {
        "5m"
    }

    fn minimum_amount_of_candles(&self) -> usize {
        1
    }

    fn minimum_date_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::days(1)
    }

    fn current_candle_date_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now
    }

    fn signal_date(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now
    }

    async fn forecast(&self, _candles: &[Candle]) -> Forecast {
        Forecast { trade_advice: self.advice }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_advice_strategy_always_returns_configured_advice() {
        let s = FixedAdviceStrategy::new("always-buy", TradeAdvice::Buy);
        let forecast = s.forecast(&[]).await;
        assert_eq!(forecast.trade_advice, TradeAdvice::Buy);
    }
}
