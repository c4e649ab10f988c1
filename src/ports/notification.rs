// ports/notification.rs — the notification port (spec.md §6).
//
// Grounded on the teacher's publisher.rs::RedisPublisher: a prefixed,
// fire-and-forget publish over a lazily-established connection. The buy/sell/
// error events this port sends are themselves generalized from the same
// file's `publish_status`/`publish_shadow_fill` calls.
use async_trait::async_trait;
use redis::AsyncCommands;

#[derive(Debug, Clone)]
pub enum Notification {
    TradeOpened { market: String, trade_id: String },
    SellPlaced { market: String, trade_id: String },
    TradeClosed { market: String, trade_id: String, profit_percent: f64 },
    OrderCancelled { market: String },
    Error { context: String },
}

impl Notification {
    fn text(&self) -> String {
        match self {
            Notification::TradeOpened { market, trade_id } => {
                format!("opened {} ({})", market, trade_id)
            }
            Notification::SellPlaced { market, trade_id } => {
                format!("sell placed {} ({})", market, trade_id)
            }
            Notification::TradeClosed { market, trade_id, profit_percent } => {
                format!("closed {} ({}) at {:.2}%", market, trade_id, profit_percent * 100.0)
            }
            Notification::OrderCancelled { market } => format!("cancelled {} buy order", market),
            Notification::Error { context } => format!("error: {}", context),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Fire-and-forget: a notifier failure must never interrupt a trading
    /// cycle, so this has no Result to propagate.
    async fn send(&self, notification: Notification);
}

/// Discards everything. Used wherever no notification channel is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _notification: Notification) {}
}

/// Publishes to a single Redis channel, prefixed the way `RedisPublisher`
/// prefixes its channels.
pub struct RedisNotifier {
    client: redis::Client,
    channel: String,
}

impl RedisNotifier {
    pub fn new(redis_url: &str, channel: impl Into<String>) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, channel: channel.into() })
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn send(&self, notification: Notification) {
        let message = notification.text();
        match self.client.get_async_connection().await {
            Ok(mut con) => {
                let result: Result<(), redis::RedisError> = con.publish(&self.channel, &message).await;
                if let Err(e) = result {
                    log::warn!("failed to publish notification to {}: {}", self.channel, e);
                }
            }
            Err(e) => log::warn!("failed to connect to redis for notification: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_notifier_accepts_anything() {
        let notifier = NullNotifier;
        notifier
            .send(Notification::TradeOpened { market: "ETH/BTC".to_string(), trade_id: "t1".to_string() })
            .await;
    }

    #[test]
    fn trade_closed_text_reports_percent() {
        let n = Notification::TradeClosed {
            market: "ETH/BTC".to_string(),
            trade_id: "t1".to_string(),
            profit_percent: 0.0532,
        };
        assert!(n.text().contains("5.32%"));
    }

    #[test]
    fn order_cancelled_text_matches_the_documented_message() {
        let n = Notification::OrderCancelled { market: "ETH/BTC".to_string() };
        assert_eq!(n.text(), "cancelled ETH/BTC buy order");
    }

    #[test]
    fn sell_placed_is_distinct_from_trade_opened() {
        let sell = Notification::SellPlaced { market: "ETH/BTC".to_string(), trade_id: "t1".to_string() };
        let buy = Notification::TradeOpened { market: "ETH/BTC".to_string(), trade_id: "t1".to_string() };
        assert_ne!(sell.text(), buy.text());
    }
}
