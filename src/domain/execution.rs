//! Trade execution costs.
//!
//! Fills happen at the signal price with no slippage; the only friction is
//! commission, charged on both legs and realised when the trade closes.

/// Commission settings for a backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_per_trade: 0.0,
            commission_pct: 0.0,
        }
    }
}

impl ExecutionConfig {
    /// Commission for one leg: flat_fee + (trade_value * pct / 100).
    pub fn commission(&self, trade_value: f64) -> f64 {
        self.commission_per_trade + (trade_value * self.commission_pct / 100.0)
    }

    /// Entry leg plus exit leg.
    pub fn round_trip(&self, entry_value: f64, exit_value: f64) -> f64 {
        self.commission(entry_value) + self.commission(exit_value)
    }
}
