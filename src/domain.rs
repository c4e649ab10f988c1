// domain.rs — Trade and Trader entities, the two persisted tables.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TradeId = String;
pub type TraderId = String;

pub const TRADE_PARTITION: &str = "TRADE";
pub const TRADER_PARTITION: &str = "TRADER";

/// Derives a row key that sorts newest-first when compared as strings.
/// Descending timestamp: the smallest key belongs to the most recent trade.
pub fn new_trade_id(now: DateTime<Utc>) -> TradeId {
    format!("{:020}", i64::MAX - now.timestamp_millis())
}

/// Outcome tag recorded on a Trade once it has (or attempts to have) a sell order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellType {
    None,
    StopLoss,
    TrailingStopLoss,
    TrailingStopLossUpdated,
    Timed,
    Strategy,
    Immediate,
    Cancelled,
}

impl Default for SellType {
    fn default() -> Self {
        SellType::None
    }
}

/// One position attempt: buying -> held -> selling -> closed/cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub trader_id: TraderId,
    pub market: String,

    pub stake_amount: f64,
    pub open_rate: f64,
    pub close_rate: Option<f64>,
    pub quantity: f64,
    pub close_profit: Option<f64>,
    pub close_profit_percent: Option<f64>,

    pub buy_order_id: Option<String>,
    pub sell_order_id: Option<String>,
    pub open_order_id: Option<String>,

    pub open_date: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,

    pub is_open: bool,
    pub is_buying: bool,
    pub is_selling: bool,

    pub stop_loss_rate: Option<f64>,
    pub strategy_used: String,
    pub sell_type: SellType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation(pub String);

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "trade invariant violated: {}", self.0)
    }
}
impl std::error::Error for InvariantViolation {}

impl Trade {
    /// Constructs a freshly-opened (buying) trade. `now` drives both the row
    /// key and `open_date` so the two stay consistent.
    pub fn new_buying(
        trader_id: TraderId,
        market: String,
        stake_amount: f64,
        open_rate: f64,
        quantity: f64,
        buy_order_id: String,
        strategy_used: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_trade_id(now),
            trader_id,
            market,
            stake_amount,
            open_rate,
            close_rate: None,
            quantity,
            close_profit: None,
            close_profit_percent: None,
            buy_order_id: Some(buy_order_id.clone()),
            sell_order_id: None,
            open_order_id: Some(buy_order_id),
            open_date: now,
            close_date: None,
            is_open: true,
            is_buying: true,
            is_selling: false,
            stop_loss_rate: None,
            strategy_used,
            sell_type: SellType::None,
        }
    }

    /// Checks every invariant spec.md §3/§8 requires to hold on a persisted row.
    /// A violation here is the "fatal, requires operator intervention" error kind of §7.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.is_open != self.close_date.is_none() {
            return Err(InvariantViolation(format!(
                "trade {}: is_open={} but close_date={:?}",
                self.id, self.is_open, self.close_date
            )));
        }
        if self.is_buying && (self.buy_order_id.is_none() || self.open_order_id != self.buy_order_id)
        {
            return Err(InvariantViolation(format!(
                "trade {}: is_buying but open_order_id doesn't match buy_order_id",
                self.id
            )));
        }
        if self.is_selling
            && (self.sell_order_id.is_none() || self.open_order_id != self.sell_order_id)
        {
            return Err(InvariantViolation(format!(
                "trade {}: is_selling but open_order_id doesn't match sell_order_id",
                self.id
            )));
        }
        if self.is_buying && self.is_selling {
            return Err(InvariantViolation(format!(
                "trade {}: is_buying and is_selling both true",
                self.id
            )));
        }
        let closed_with_reason = !self.is_open
            && matches!(
                self.sell_type,
                SellType::StopLoss
                    | SellType::TrailingStopLoss
                    | SellType::Timed
                    | SellType::Strategy
                    | SellType::Immediate
            );
        if closed_with_reason
            && (self.close_rate.is_none()
                || self.close_profit.is_none()
                || self.close_profit_percent.is_none())
        {
            return Err(InvariantViolation(format!(
                "trade {}: closed with sell_type {:?} but missing close economics",
                self.id, self.sell_type
            )));
        }
        Ok(())
    }

    /// Has an immediate (pre-placed take-profit) sell currently resting on the venue.
    pub fn has_immediate_sell(&self) -> bool {
        self.is_selling && self.sell_type == SellType::Immediate
    }

    /// Scope used by sell-on-strategy (§4.3) and check-for-sell (§4.9): held
    /// positions, or positions with an overridable immediate sell.
    pub fn eligible_for_sell_evaluation(&self) -> bool {
        self.is_open && (self.open_order_id.is_none() || self.sell_type == SellType::Immediate)
    }
}

/// One capital slot. At most one open Trade references a given Trader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trader {
    pub id: TraderId,
    pub current_balance: f64,
    pub stake_amount: f64,
    pub is_busy: bool,
    pub last_updated: DateTime<Utc>,
}

impl Trader {
    pub fn new(id: TraderId, stake_amount: f64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            current_balance: stake_amount,
            stake_amount,
            is_busy: false,
            last_updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_trade() -> Trade {
        Trade::new_buying(
            "trader-1".into(),
            "ETH/BTC".into(),
            0.01,
            0.05,
            0.1937,
            "buy-1".into(),
            "default".into(),
            Utc::now(),
        )
    }

    #[test]
    fn row_keys_sort_newest_first() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::seconds(5);
        let earlier_key = new_trade_id(earlier);
        let later_key = new_trade_id(later);
        assert!(later_key < earlier_key, "newer trade must sort first");
    }

    #[test]
    fn fresh_buy_satisfies_invariants() {
        assert!(base_trade().check_invariants().is_ok());
    }

    #[test]
    fn buying_without_matching_open_order_id_is_invalid() {
        let mut t = base_trade();
        t.open_order_id = Some("other".into());
        assert!(t.check_invariants().is_err());
    }

    #[test]
    fn buying_and_selling_simultaneously_is_invalid() {
        let mut t = base_trade();
        t.is_selling = true;
        t.sell_order_id = t.open_order_id.clone();
        assert!(t.check_invariants().is_err());
    }

    #[test]
    fn closed_strategy_sell_requires_close_economics() {
        let mut t = base_trade();
        t.is_open = false;
        t.is_buying = false;
        t.close_date = Some(Utc::now());
        t.sell_type = SellType::Strategy;
        assert!(t.check_invariants().is_err());
        t.close_rate = Some(0.055);
        t.close_profit = Some(0.0006810);
        t.close_profit_percent = Some(6.81);
        assert!(t.check_invariants().is_ok());
    }

    #[test]
    fn eligible_for_sell_scope_matches_held_and_immediate() {
        let mut t = base_trade();
        t.is_buying = false;
        t.open_order_id = None;
        assert!(t.eligible_for_sell_evaluation());

        t.open_order_id = Some("sell-1".into());
        t.sell_order_id = Some("sell-1".into());
        t.is_selling = true;
        t.sell_type = SellType::Immediate;
        assert!(t.eligible_for_sell_evaluation());

        t.sell_type = SellType::Strategy;
        assert!(!t.eligible_for_sell_evaluation());
    }
}
