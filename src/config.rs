// config.rs — TradeManagerConfig: every semantic key listed in spec.md §6.
//
// Loaded from `TM_*` environment variables the way the teacher's main.rs
// reads `MM_*`/`HL_*` vars, with the same `unwrap_or(default)` idiom.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BuyInPriceStrategy {
    AskLastBalance,
    Percentage,
}

/// One step of the time-based ROI ladder: after `duration_minutes` have
/// elapsed, sell if unrealized profit exceeds `profit_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiStep {
    pub duration_minutes: i64,
    pub profit_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeManagerConfig {
    pub max_concurrent_trades: usize,
    pub stake_per_trader: f64,

    /// Not itemised by name in spec.md §6, but required by §4.4 step 2 to
    /// filter markets ("quote currency equals the configured base"). See
    /// SPEC_FULL.md §D.1.
    pub quote_currency: String,
    pub minimum_volume: f64,
    pub always_trade_list: Vec<String>,
    pub market_blacklist: Vec<String>,

    pub cancel_unbought_each_cycle: bool,
    pub fee_percentage: f64,

    pub buy_in_price_strategy: BuyInPriceStrategy,
    /// alpha in [0, 1] for AskLastBalance.
    pub ask_last_balance: f64,
    /// discount p for Percentage.
    pub buy_in_price_percentage: f64,

    pub immediately_place_sell_order: bool,
    pub immediately_place_sell_order_at_profit: f64,

    /// Negative threshold, e.g. -0.10 for a 10% stop.
    pub stop_loss_percentage: f64,
    /// Evaluated in configured order; first match wins.
    pub return_on_investment: Vec<RoiStep>,

    pub enable_trailing_stop: bool,
    pub trailing_stop_percentage: f64,
    pub trailing_stop_starting_percentage: f64,

    pub is_dry_running: bool,
}

impl Default for TradeManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_trades: 3,
            stake_per_trader: 0.01,
            quote_currency: "BTC".to_string(),
            minimum_volume: 10.0,
            always_trade_list: Vec::new(),
            market_blacklist: Vec::new(),
            cancel_unbought_each_cycle: true,
            fee_percentage: 0.0025,
            buy_in_price_strategy: BuyInPriceStrategy::AskLastBalance,
            ask_last_balance: 0.5,
            buy_in_price_percentage: 0.01,
            immediately_place_sell_order: false,
            immediately_place_sell_order_at_profit: 0.03,
            stop_loss_percentage: -0.10,
            return_on_investment: vec![
                RoiStep { duration_minutes: 0, profit_threshold: 0.10 },
                RoiStep { duration_minutes: 30, profit_threshold: 0.05 },
                RoiStep { duration_minutes: 60, profit_threshold: 0.02 },
            ],
            enable_trailing_stop: false,
            trailing_stop_percentage: 0.01,
            trailing_stop_starting_percentage: 0.02,
            is_dry_running: true,
        }
    }
}

impl TradeManagerConfig {
    /// Reads `TM_*` environment variables, falling back to `Default` for any
    /// key that is unset or fails to parse.
    pub fn from_env() -> Self {
        let default = Self::default();

        let env_f64 = |key: &str, fallback: f64| -> f64 {
            std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(fallback)
        };
        let env_usize = |key: &str, fallback: usize| -> usize {
            std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(fallback)
        };
        let env_bool = |key: &str, fallback: bool| -> bool {
            std::env::var(key).ok().map(|v| v == "1" || v == "true").unwrap_or(fallback)
        };
        let env_list = |key: &str, fallback: Vec<String>| -> Vec<String> {
            std::env::var(key)
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(fallback)
        };
        let env_strategy = |key: &str, fallback: BuyInPriceStrategy| -> BuyInPriceStrategy {
            match std::env::var(key).ok().as_deref() {
                Some("Percentage") => BuyInPriceStrategy::Percentage,
                Some("AskLastBalance") => BuyInPriceStrategy::AskLastBalance,
                _ => fallback,
            }
        };

        Self {
            max_concurrent_trades: env_usize("TM_MAX_CONCURRENT_TRADES", default.max_concurrent_trades),
            stake_per_trader: env_f64("TM_STAKE_PER_TRADER", default.stake_per_trader),
            quote_currency: std::env::var("TM_QUOTE_CURRENCY")
                .unwrap_or(default.quote_currency)
                .to_uppercase(),
            minimum_volume: env_f64("TM_MINIMUM_VOLUME", default.minimum_volume),
            always_trade_list: env_list("TM_ALWAYS_TRADE_LIST", default.always_trade_list),
            market_blacklist: env_list("TM_MARKET_BLACKLIST", default.market_blacklist),
            cancel_unbought_each_cycle: env_bool(
                "TM_CANCEL_UNBOUGHT_EACH_CYCLE",
                default.cancel_unbought_each_cycle,
            ),
            fee_percentage: env_f64("TM_FEE_PERCENTAGE", default.fee_percentage),
            buy_in_price_strategy: env_strategy("TM_BUY_IN_PRICE_STRATEGY", default.buy_in_price_strategy),
            ask_last_balance: env_f64("TM_ASK_LAST_BALANCE", default.ask_last_balance),
            buy_in_price_percentage: env_f64(
                "TM_BUY_IN_PRICE_PERCENTAGE",
                default.buy_in_price_percentage,
            ),
            immediately_place_sell_order: env_bool(
                "TM_IMMEDIATELY_PLACE_SELL_ORDER",
                default.immediately_place_sell_order,
            ),
            immediately_place_sell_order_at_profit: env_f64(
                "TM_IMMEDIATELY_PLACE_SELL_ORDER_AT_PROFIT",
                default.immediately_place_sell_order_at_profit,
            ),
            stop_loss_percentage: env_f64("TM_STOP_LOSS_PERCENTAGE", default.stop_loss_percentage),
            return_on_investment: default.return_on_investment.clone(),
            enable_trailing_stop: env_bool("TM_ENABLE_TRAILING_STOP", default.enable_trailing_stop),
            trailing_stop_percentage: env_f64(
                "TM_TRAILING_STOP_PERCENTAGE",
                default.trailing_stop_percentage,
            ),
            trailing_stop_starting_percentage: env_f64(
                "TM_TRAILING_STOP_STARTING_PERCENTAGE",
                default.trailing_stop_starting_percentage,
            ),
            is_dry_running: env_bool("TM_IS_DRY_RUNNING", default.is_dry_running),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_conservative() {
        let c = TradeManagerConfig::default();
        assert!(c.is_dry_running);
        assert!(c.stop_loss_percentage < 0.0);
        assert_eq!(c.quote_currency, "BTC");
    }

    #[test]
    fn roi_steps_preserve_configured_order() {
        let c = TradeManagerConfig::default();
        let minutes: Vec<i64> = c.return_on_investment.iter().map(|s| s.duration_minutes).collect();
        assert_eq!(minutes, vec![0, 30, 60]);
    }
}
