// ports/exchange.rs — the Exchange port (spec.md §6).
//
// Grounded on the teacher's exchange.rs: an async_trait port with a manual
// Display-based error enum, and an in-memory stand-in implementing the same
// trait the live client would.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub market_name: String,
    pub base_volume: f64,
    pub currency_pair: CurrencyPair,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Balance {
    pub available: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInfo {
    pub status: OrderStatus,
    pub original_quantity: f64,
    pub price: f64,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ExchangeError {
    Network(String),
    RateLimited,
    InsufficientFunds(String),
    InvalidOrder(String),
    Unknown(String),
}

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeError::Network(s) => write!(f, "network error: {}", s),
            ExchangeError::RateLimited => write!(f, "rate limited"),
            ExchangeError::InsufficientFunds(s) => write!(f, "insufficient funds: {}", s),
            ExchangeError::InvalidOrder(s) => write!(f, "invalid order: {}", s),
            ExchangeError::Unknown(s) => write!(f, "unknown exchange error: {}", s),
        }
    }
}
impl std::error::Error for ExchangeError {}

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn get_market_summaries(&self) -> Result<Vec<MarketSummary>, ExchangeError>;
    async fn get_ticker(&self, market: &str) -> Result<Ticker, ExchangeError>;
    async fn get_ticker_history(
        &self,
        market: &str,
        since: DateTime<Utc>,
        period: &str,
    ) -> Result<Vec<Candle>, ExchangeError>;
    async fn get_balance(&self, currency: &str) -> Result<Balance, ExchangeError>;
    async fn buy(&self, market: &str, qty: f64, price: f64) -> Result<String, ExchangeError>;
    async fn sell(&self, market: &str, qty: f64, price: f64) -> Result<String, ExchangeError>;
    async fn get_order(&self, order_id: &str, market: &str) -> Result<OrderInfo, ExchangeError>;
    async fn cancel_order(&self, order_id: &str, market: &str) -> Result<(), ExchangeError>;
}

/// In-memory stand-in used for tests and dry-running, mirroring the teacher's
/// `SimExchange` (same trait object, no network round-trip).
pub struct SimExchange {
    pub tickers: std::sync::Mutex<HashMap<String, Ticker>>,
    pub summaries: std::sync::Mutex<Vec<MarketSummary>>,
    pub balances: std::sync::Mutex<HashMap<String, f64>>,
    pub orders: std::sync::Mutex<HashMap<String, OrderInfo>>,
    next_order_id: std::sync::atomic::AtomicU64,
}

impl SimExchange {
    pub fn new() -> Self {
        Self {
            tickers: std::sync::Mutex::new(HashMap::new()),
            summaries: std::sync::Mutex::new(Vec::new()),
            balances: std::sync::Mutex::new(HashMap::new()),
            orders: std::sync::Mutex::new(HashMap::new()),
            next_order_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub fn set_ticker(&self, market: &str, ticker: Ticker) {
        self.tickers.lock().unwrap().insert(market.to_string(), ticker);
    }

    pub fn set_balance(&self, currency: &str, amount: f64) {
        self.balances.lock().unwrap().insert(currency.to_string(), amount);
    }

    /// Marks a previously placed order as Filled, as if the venue executed it.
    pub fn fill_order(&self, order_id: &str, fill_price: f64, fill_qty: f64, fill_time: DateTime<Utc>) {
        let mut orders = self.orders.lock().unwrap();
        if let Some(order) = orders.get_mut(order_id) {
            order.status = OrderStatus::Filled;
            order.price = fill_price;
            order.original_quantity = fill_qty;
            order.time = fill_time;
        }
    }

    fn new_order_id(&self) -> String {
        let n = self.next_order_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        format!("sim-order-{}", n)
    }
}

impl Default for SimExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for SimExchange {
    async fn get_market_summaries(&self) -> Result<Vec<MarketSummary>, ExchangeError> {
        Ok(self.summaries.lock().unwrap().clone())
    }

    async fn get_ticker(&self, market: &str) -> Result<Ticker, ExchangeError> {
        self.tickers
            .lock()
            .unwrap()
            .get(market)
            .cloned()
            .ok_or_else(|| ExchangeError::Unknown(format!("no ticker for {}", market)))
    }

    async fn get_ticker_history(
        &self,
        _market: &str,
        _since: DateTime<Utc>,
        _period: &str,
    ) -> Result<Vec<Candle>, ExchangeError> {
        Ok(Vec::new())
    }

    async fn get_balance(&self, currency: &str) -> Result<Balance, ExchangeError> {
        let available = self.balances.lock().unwrap().get(currency).cloned().unwrap_or(0.0);
        Ok(Balance { available })
    }

    async fn buy(&self, _market: &str, qty: f64, price: f64) -> Result<String, ExchangeError> {
        let id = self.new_order_id();
        self.orders.lock().unwrap().insert(
            id.clone(),
            OrderInfo { status: OrderStatus::Open, original_quantity: qty, price, time: Utc::now() },
        );
        Ok(id)
    }

    async fn sell(&self, _market: &str, qty: f64, price: f64) -> Result<String, ExchangeError> {
        let id = self.new_order_id();
        self.orders.lock().unwrap().insert(
            id.clone(),
            OrderInfo { status: OrderStatus::Open, original_quantity: qty, price, time: Utc::now() },
        );
        Ok(id)
    }

    async fn get_order(&self, order_id: &str, _market: &str) -> Result<OrderInfo, ExchangeError> {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| ExchangeError::Unknown(format!("no such order {}", order_id)))
    }

    async fn cancel_order(&self, order_id: &str, _market: &str) -> Result<(), ExchangeError> {
        if let Some(order) = self.orders.lock().unwrap().get_mut(order_id) {
            order.status = OrderStatus::Cancelled;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sim_exchange_round_trips_an_order() {
        let ex = SimExchange::new();
        let id = ex.buy("ETH/BTC", 0.1, 0.05).await.unwrap();
        let info = ex.get_order(&id, "ETH/BTC").await.unwrap();
        assert_eq!(info.status, OrderStatus::Open);

        ex.fill_order(&id, 0.0516, 0.1942, Utc::now());
        let info = ex.get_order(&id, "ETH/BTC").await.unwrap();
        assert_eq!(info.status, OrderStatus::Filled);
        assert_eq!(info.price, 0.0516);
    }

    #[tokio::test]
    async fn cancel_marks_order_cancelled() {
        let ex = SimExchange::new();
        let id = ex.buy("ETH/BTC", 0.1, 0.05).await.unwrap();
        ex.cancel_order(&id, "ETH/BTC").await.unwrap();
        let info = ex.get_order(&id, "ETH/BTC").await.unwrap();
        assert_eq!(info.status, OrderStatus::Cancelled);
    }
}
