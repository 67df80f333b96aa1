//! Volatility-regime adaptive EMA crossover.
//!
//! Normalized ATR is ranked against its own trailing window and classified
//! into LOW / MEDIUM / HIGH. Each regime has its own fast/slow EMA pair. The
//! regime in force at entry is locked into the position; the exit watches
//! for the reverse cross of *that* pair, even if volatility has since moved
//! into another regime.

use super::{stop_loss_param, BarContext, StopLoss, Strategy, STOP_LOSS_SPEC};
use crate::domain::error::AdaptraderError;
use crate::domain::indicator::IndicatorKey;
use crate::domain::indicator_cache::IndicatorView;
use crate::domain::params::{Constraint, ParamSpec, ParameterSet};
use crate::domain::position::{EntryContext, ExitReason, ExitSignal, Position};
use crate::domain::regime::Regime;

pub const PARAMS: &[ParamSpec] = &[
    ParamSpec::period("fast_length_low", 13),
    ParamSpec::period("slow_length_low", 70),
    ParamSpec::period("fast_length_med", 23),
    ParamSpec::period("slow_length_med", 98),
    ParamSpec::period("fast_length_high", 43),
    ParamSpec::period("slow_length_high", 122),
    ParamSpec::period("atr_length", 15),
    ParamSpec::period("volatility_length", 69),
    ParamSpec::percentile("low_vol_percentile", 28),
    ParamSpec::percentile("high_vol_percentile", 64),
    STOP_LOSS_SPEC,
];

pub fn constraints() -> Vec<Constraint> {
    vec![
        Constraint::less_than("fast_length_low", "slow_length_low"),
        Constraint::less_than("fast_length_med", "slow_length_med"),
        Constraint::less_than("fast_length_high", "slow_length_high"),
        Constraint::less_than("low_vol_percentile", "high_vol_percentile"),
    ]
}

const VOL_RANK: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmaPair {
    pub fast: usize,
    pub slow: usize,
}

#[derive(Debug, Clone)]
pub struct RegimeEma {
    pub low: EmaPair,
    pub medium: EmaPair,
    pub high: EmaPair,
    pub atr_length: usize,
    pub volatility_length: usize,
    pub low_percentile: f64,
    pub high_percentile: f64,
    pub stop_loss: Option<StopLoss>,
}

impl RegimeEma {
    pub fn from_params(params: &ParameterSet) -> Result<Self, AdaptraderError> {
        let pair = |fast: &str, slow: &str| -> Result<EmaPair, AdaptraderError> {
            Ok(EmaPair {
                fast: params.period(fast)?,
                slow: params.period(slow)?,
            })
        };
        Ok(RegimeEma {
            low: pair("fast_length_low", "slow_length_low")?,
            medium: pair("fast_length_med", "slow_length_med")?,
            high: pair("fast_length_high", "slow_length_high")?,
            atr_length: params.period("atr_length")?,
            volatility_length: params.period("volatility_length")?,
            low_percentile: params.number("low_vol_percentile")?,
            high_percentile: params.number("high_vol_percentile")?,
            stop_loss: stop_loss_param(params)?,
        })
    }

    /// Slots of the (fast, slow) EMA pair governing `regime`.
    fn slots(regime: Regime) -> (usize, usize) {
        match regime {
            Regime::Low => (0, 1),
            Regime::Medium => (2, 3),
            Regime::High => (4, 5),
        }
    }

    pub fn regime_at(&self, view: &IndicatorView<'_>, i: usize) -> Option<Regime> {
        view.at(VOL_RANK, i)
            .map(|rank| Regime::classify(rank, self.low_percentile, self.high_percentile))
    }

    fn longest_slow(&self) -> usize {
        self.low.slow.max(self.medium.slow).max(self.high.slow)
    }
}

impl Strategy for RegimeEma {
    fn name(&self) -> &'static str {
        "regime_ema"
    }

    fn indicator_keys(&self) -> Vec<IndicatorKey> {
        vec![
            IndicatorKey::Ema(self.low.fast),
            IndicatorKey::Ema(self.low.slow),
            IndicatorKey::Ema(self.medium.fast),
            IndicatorKey::Ema(self.medium.slow),
            IndicatorKey::Ema(self.high.fast),
            IndicatorKey::Ema(self.high.slow),
            IndicatorKey::VolatilityRank {
                atr_length: self.atr_length,
                window: self.volatility_length,
            },
        ]
    }

    /// The slowest EMA needs its own period to settle even though it is
    /// defined from the first bar.
    fn minimum_warmup(&self, indicators: &IndicatorView<'_>) -> usize {
        indicators
            .first_valid()
            .max(self.longest_slow().saturating_sub(1))
            .max(1)
    }

    fn stop_loss(&self) -> Option<StopLoss> {
        self.stop_loss
    }

    fn entry_signal(&self, ctx: &BarContext<'_>) -> Option<EntryContext> {
        let regime = self.regime_at(ctx.indicators, ctx.index)?;
        let (fast, slow) = Self::slots(regime);
        ctx.crossed_above(fast, slow).then(|| EntryContext::with_regime(regime))
    }

    fn exit_signal(&self, ctx: &BarContext<'_>, position: &mut Position) -> Option<ExitSignal> {
        // Positions opened by this strategy always carry a regime; fall back
        // to the current one for positions handed in from elsewhere.
        let regime = position
            .context
            .regime
            .or_else(|| self.regime_at(ctx.indicators, ctx.index))?;
        let (fast, slow) = Self::slots(regime);
        ctx.crossed_below(fast, slow).then(|| ExitSignal {
            reason: ExitReason::Signal,
            price: ctx.bar().close,
        })
    }
}
