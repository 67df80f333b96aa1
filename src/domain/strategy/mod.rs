//! Strategy units.
//!
//! A strategy is built from a [`ParameterSet`] and exposes a fixed capability
//! set to the backtest engine: which indicators it reads, how many bars they
//! need to warm up, and per-bar entry and exit decisions. [`StrategyKind`] is
//! the registry of variants, with their parameter declarations and
//! structural constraints.

pub mod donchian;
pub mod ema_cross;
pub mod kama_adx;
pub mod oscillator;
pub mod regime_ema;

use crate::domain::error::AdaptraderError;
use crate::domain::indicator::IndicatorKey;
use crate::domain::indicator_cache::{IndicatorCache, IndicatorView};
use crate::domain::ohlcv::{OhlcvBar, PriceSeries};
use crate::domain::params::{check_constraints, defaults, Constraint, ParamSpec, ParameterSet};
use crate::domain::position::{EntryContext, ExitReason, ExitSignal, Position};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a strategy sees at bar `index`.
pub struct BarContext<'a> {
    pub index: usize,
    pub bars: &'a [OhlcvBar],
    pub indicators: &'a IndicatorView<'a>,
}

impl<'a> BarContext<'a> {
    pub fn bar(&self) -> &'a OhlcvBar {
        &self.bars[self.index]
    }

    pub fn prev_bar(&self) -> Option<&'a OhlcvBar> {
        self.index.checked_sub(1).map(|i| &self.bars[i])
    }

    /// Whether slot `a` crossed above slot `b` on this bar.
    pub fn crossed_above(&self, a: usize, b: usize) -> bool {
        match (
            self.indicators.pair(a, self.index),
            self.indicators.pair(b, self.index),
        ) {
            (Some((pa, ca)), Some((pb, cb))) => crossed_above(pa, pb, ca, cb),
            _ => false,
        }
    }

    /// Whether slot `a` crossed below slot `b` on this bar.
    pub fn crossed_below(&self, a: usize, b: usize) -> bool {
        match (
            self.indicators.pair(a, self.index),
            self.indicators.pair(b, self.index),
        ) {
            (Some((pa, ca)), Some((pb, cb))) => crossed_below(pa, pb, ca, cb),
            _ => false,
        }
    }
}

/// prev_a <= prev_b && a > b
pub fn crossed_above(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a <= prev_b && a > b
}

/// prev_a >= prev_b && a < b
pub fn crossed_below(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a >= prev_b && a < b
}

pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Indicator series this strategy reads, in slot order.
    fn indicator_keys(&self) -> Vec<IndicatorKey>;

    /// Make sure every indicator this strategy reads is in `cache`.
    fn compute_indicators(
        &self,
        prices: &PriceSeries,
        cache: &mut IndicatorCache,
    ) -> Vec<IndicatorKey> {
        let keys = self.indicator_keys();
        for &key in &keys {
            cache.ensure(prices, key);
        }
        keys
    }

    /// First bar index at which signals may be evaluated.
    fn minimum_warmup(&self, indicators: &IndicatorView<'_>) -> usize {
        indicators.first_valid() + 1
    }

    /// Fixed-percent stop loss, evaluated before `exit_signal`.
    fn stop_loss(&self) -> Option<StopLoss> {
        None
    }

    fn entry_signal(&self, ctx: &BarContext<'_>) -> Option<EntryContext>;

    /// May only move `position.trailing_stop` up.
    fn exit_signal(&self, ctx: &BarContext<'_>, position: &mut Position) -> Option<ExitSignal>;
}

/// Fixed-percent stop below the entry price, checked against the bar's low
/// so it can trigger intrabar even when the close never breaches it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopLoss {
    pub pct: f64,
}

impl StopLoss {
    /// `None` when `pct` is zero (disabled).
    pub fn from_pct(pct: f64) -> Option<StopLoss> {
        (pct > 0.0).then_some(StopLoss { pct })
    }

    pub fn level(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.pct / 100.0)
    }

    /// Fills at the stop level, or at the open when the bar gaps through it.
    pub fn check(&self, position: &Position, bar: &OhlcvBar) -> Option<ExitSignal> {
        let level = self.level(position.entry_price);
        if bar.low > level {
            return None;
        }
        Some(ExitSignal {
            reason: ExitReason::StopLoss,
            price: bar.open.min(level),
        })
    }
}

/// Read `stop_loss_pct` (0 disables).
pub(crate) fn stop_loss_param(params: &ParameterSet) -> Result<Option<StopLoss>, AdaptraderError> {
    let pct = params.number("stop_loss_pct")?;
    if !(0.0..100.0).contains(&pct) {
        return Err(AdaptraderError::invalid_params(format!(
            "stop_loss_pct must be in [0, 100), got {pct}"
        )));
    }
    Ok(StopLoss::from_pct(pct))
}

pub(crate) const STOP_LOSS_SPEC: ParamSpec = ParamSpec::float("stop_loss_pct", 0.0, 0.0, 99.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    EmaCross,
    RegimeEma,
    KamaAdx,
    Rsi,
    Macd,
    Donchian,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::EmaCross,
        StrategyKind::RegimeEma,
        StrategyKind::KamaAdx,
        StrategyKind::Rsi,
        StrategyKind::Macd,
        StrategyKind::Donchian,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::EmaCross => "ema_cross",
            StrategyKind::RegimeEma => "regime_ema",
            StrategyKind::KamaAdx => "kama_adx",
            StrategyKind::Rsi => "rsi",
            StrategyKind::Macd => "macd",
            StrategyKind::Donchian => "donchian",
        }
    }

    pub fn param_specs(&self) -> &'static [ParamSpec] {
        match self {
            StrategyKind::EmaCross => ema_cross::PARAMS,
            StrategyKind::RegimeEma => regime_ema::PARAMS,
            StrategyKind::KamaAdx => kama_adx::PARAMS,
            StrategyKind::Rsi => oscillator::RSI_PARAMS,
            StrategyKind::Macd => oscillator::MACD_PARAMS,
            StrategyKind::Donchian => donchian::PARAMS,
        }
    }

    pub fn spec(&self, name: &str) -> Option<&'static ParamSpec> {
        self.param_specs().iter().find(|s| s.name == name)
    }

    pub fn defaults(&self) -> ParameterSet {
        defaults(self.param_specs())
    }

    pub fn constraints(&self) -> Vec<Constraint> {
        match self {
            StrategyKind::EmaCross => ema_cross::constraints(),
            StrategyKind::RegimeEma => regime_ema::constraints(),
            StrategyKind::KamaAdx => kama_adx::constraints(),
            StrategyKind::Rsi => oscillator::rsi_constraints(),
            StrategyKind::Macd => oscillator::macd_constraints(),
            StrategyKind::Donchian => donchian::constraints(),
        }
    }

    /// Build a strategy from `params`. Fails with `InvalidParameterSet` when a
    /// parameter is missing or ill-typed, or a constraint is violated.
    pub fn build(&self, params: &ParameterSet) -> Result<Box<dyn Strategy>, AdaptraderError> {
        check_constraints(params, &self.constraints())?;
        Ok(match self {
            StrategyKind::EmaCross => Box::new(ema_cross::EmaCross::from_params(params)?),
            StrategyKind::RegimeEma => Box::new(regime_ema::RegimeEma::from_params(params)?),
            StrategyKind::KamaAdx => Box::new(kama_adx::KamaAdx::from_params(params)?),
            StrategyKind::Rsi => Box::new(oscillator::Oscillator::rsi_from_params(params)?),
            StrategyKind::Macd => Box::new(oscillator::Oscillator::macd_from_params(params)?),
            StrategyKind::Donchian => Box::new(donchian::Donchian::from_params(params)?),
        })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = AdaptraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or(AdaptraderError::UnknownStrategy { name: wanted })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn crossing_rules() {
        assert!(crossed_above(1.0, 1.0, 2.0, 1.0));
        assert!(crossed_above(0.5, 1.0, 2.0, 1.0));
        assert!(!crossed_above(1.5, 1.0, 2.0, 1.0));
        assert!(!crossed_above(0.5, 1.0, 1.0, 1.0));
        assert!(crossed_below(1.0, 1.0, 0.5, 1.0));
        assert!(!crossed_below(0.5, 1.0, 0.4, 1.0));
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!(matches!(
            "bogus".parse::<StrategyKind>(),
            Err(AdaptraderError::UnknownStrategy { .. })
        ));
    }

    #[test]
    fn every_kind_builds_from_defaults() {
        for kind in StrategyKind::ALL {
            let strategy = kind.build(&kind.defaults()).unwrap();
            assert_eq!(strategy.name(), kind.name());
            assert!(!strategy.indicator_keys().is_empty());
        }
    }

    #[test]
    fn defaults_satisfy_constraints() {
        for kind in StrategyKind::ALL {
            let defaults = kind.defaults();
            for c in kind.constraints() {
                assert!(c.holds(&defaults), "{kind}: {c}");
            }
        }
    }

    #[test]
    fn build_rejects_constraint_violation() {
        let params = StrategyKind::EmaCross
            .defaults()
            .with_int("fast_length", 30)
            .with_int("slow_length", 10);
        assert!(matches!(
            StrategyKind::EmaCross.build(&params),
            Err(AdaptraderError::InvalidParameterSet { .. })
        ));
    }

    #[test]
    fn build_rejects_missing_param() {
        let params = ParameterSet::new().with_int("fast_length", 3);
        assert!(StrategyKind::EmaCross.build(&params).is_err());
    }

    #[test]
    fn stop_loss_disabled_at_zero() {
        assert!(StopLoss::from_pct(0.0).is_none());
        assert!(StopLoss::from_pct(5.0).is_some());
    }

    #[test]
    fn stop_loss_triggers_on_low_not_close() {
        let stop = StopLoss { pct: 5.0 };
        let position = Position::open(0, ts(0), 100.0, 10.0, EntryContext::default());
        let bar = OhlcvBar {
            timestamp: ts(1),
            open: 99.0,
            high: 101.0,
            low: 94.0,
            close: 100.5,
            volume: 0.0,
        };
        let exit = stop.check(&position, &bar).unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
        assert!((exit.price - 95.0).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_gap_fills_at_open() {
        let stop = StopLoss { pct: 5.0 };
        let position = Position::open(0, ts(0), 100.0, 10.0, EntryContext::default());
        let bar = OhlcvBar {
            timestamp: ts(1),
            open: 90.0,
            high: 91.0,
            low: 89.0,
            close: 90.5,
            volume: 0.0,
        };
        assert!((stop.check(&position, &bar).unwrap().price - 90.0).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_not_hit() {
        let stop = StopLoss { pct: 5.0 };
        let position = Position::open(0, ts(0), 100.0, 10.0, EntryContext::default());
        let bar = OhlcvBar {
            timestamp: ts(1),
            open: 99.0,
            high: 101.0,
            low: 95.5,
            close: 96.0,
            volume: 0.0,
        };
        assert!(stop.check(&position, &bar).is_none());
    }

    #[test]
    fn compute_indicators_fills_cache() {
        let prices = series_from_closes(&(0..40).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let strategy = StrategyKind::EmaCross
            .build(&StrategyKind::EmaCross.defaults())
            .unwrap();
        let mut cache = IndicatorCache::new();
        let keys = strategy.compute_indicators(&prices, &mut cache);
        assert_eq!(cache.len(), keys.len());
        assert!(cache.view(&keys).is_ok());
    }
}
