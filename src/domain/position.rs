//! Open position state and completed trades.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::regime::Regime;

/// Context a strategy captures when it signals an entry. Locked into the
/// position; exits read it instead of recomputing it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EntryContext {
    pub regime: Option<Regime>,
    pub initial_stop: Option<f64>,
}

impl EntryContext {
    pub fn with_regime(regime: Regime) -> Self {
        EntryContext {
            regime: Some(regime),
            initial_stop: None,
        }
    }

    pub fn with_stop(stop: f64) -> Self {
        EntryContext {
            regime: None,
            initial_stop: Some(stop),
        }
    }
}

/// Single long position. Only `trailing_stop` changes while it is open.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_index: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub shares: f64,
    pub context: EntryContext,
    pub trailing_stop: Option<f64>,
}

impl Position {
    pub fn open(
        entry_index: usize,
        entry_time: NaiveDateTime,
        entry_price: f64,
        shares: f64,
        context: EntryContext,
    ) -> Self {
        Position {
            entry_index,
            entry_time,
            entry_price,
            shares,
            context,
            trailing_stop: context.initial_stop,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.shares * (price - self.entry_price)
    }

    /// Move the trailing stop up to `proposed`; never lowers it.
    /// Returns the stop in force afterwards.
    pub fn ratchet_stop(&mut self, proposed: f64) -> f64 {
        if proposed.is_nan() {
            return self.trailing_stop.unwrap_or(f64::NAN);
        }
        let level = match self.trailing_stop {
            Some(current) if current >= proposed => current,
            _ => proposed,
        };
        self.trailing_stop = Some(level);
        level
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TrailingStop,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::Signal => "SIGNAL",
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::EndOfData => "END_OF_DATA",
        };
        f.write_str(s)
    }
}

/// An exit decision: why and at what price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSignal {
    pub reason: ExitReason,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: f64,
    pub commission: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub exit_reason: ExitReason,
    pub context: EntryContext,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl.is_finite() && self.pnl > 0.0
    }
}
