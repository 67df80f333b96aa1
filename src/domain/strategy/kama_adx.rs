//! KAMA trend follower with ADX gating and an ATR trailing stop.
//!
//! Entry: close crosses above KAMA while ADX is above the threshold.
//! Exit, in order: close below the trailing stop, close crossing back under
//! KAMA. The stop starts at `close - k * ATR` on the entry bar and is then
//! ratcheted to `max(stop, close - k * ATR)` on every bar the position stays
//! open.

use super::{stop_loss_param, BarContext, StopLoss, Strategy, STOP_LOSS_SPEC};
use crate::domain::error::AdaptraderError;
use crate::domain::indicator::IndicatorKey;
use crate::domain::params::{Constraint, ParamSpec, ParameterSet};
use crate::domain::position::{EntryContext, ExitReason, ExitSignal, Position};

pub const PARAMS: &[ParamSpec] = &[
    ParamSpec::period("kama_length", 10),
    ParamSpec::period("kama_fast", 2),
    ParamSpec::period("kama_slow", 30),
    ParamSpec::period("adx_length", 14),
    ParamSpec::period("adx_smoothing", 14),
    ParamSpec::float("adx_threshold", 20.0, 0.0, 100.0),
    ParamSpec::period("atr_length", 14),
    ParamSpec::float("atr_multiplier", 3.0, 0.1, 20.0),
    STOP_LOSS_SPEC,
];

pub fn constraints() -> Vec<Constraint> {
    vec![Constraint::less_than("kama_fast", "kama_slow")]
}

const KAMA: usize = 0;
const ADX: usize = 1;
const ATR: usize = 2;

#[derive(Debug, Clone)]
pub struct KamaAdx {
    pub kama_length: usize,
    pub kama_fast: usize,
    pub kama_slow: usize,
    pub adx_length: usize,
    pub adx_smoothing: usize,
    pub adx_threshold: f64,
    pub atr_length: usize,
    pub atr_multiplier: f64,
    pub stop_loss: Option<StopLoss>,
}

impl KamaAdx {
    pub fn from_params(params: &ParameterSet) -> Result<Self, AdaptraderError> {
        let atr_multiplier = params.number("atr_multiplier")?;
        if atr_multiplier <= 0.0 {
            return Err(AdaptraderError::invalid_params(format!(
                "atr_multiplier must be positive, got {atr_multiplier}"
            )));
        }
        Ok(KamaAdx {
            kama_length: params.period("kama_length")?,
            kama_fast: params.period("kama_fast")?,
            kama_slow: params.period("kama_slow")?,
            adx_length: params.period("adx_length")?,
            adx_smoothing: params.period("adx_smoothing")?,
            adx_threshold: params.number("adx_threshold")?,
            atr_length: params.period("atr_length")?,
            atr_multiplier,
            stop_loss: stop_loss_param(params)?,
        })
    }

    fn stop_level(&self, ctx: &BarContext<'_>) -> Option<f64> {
        let atr = ctx.indicators.at(ATR, ctx.index)?;
        Some(ctx.bar().close - self.atr_multiplier * atr)
    }
}

impl Strategy for KamaAdx {
    fn name(&self) -> &'static str {
        "kama_adx"
    }

    fn indicator_keys(&self) -> Vec<IndicatorKey> {
        vec![
            IndicatorKey::Kama {
                length: self.kama_length,
                fast: self.kama_fast,
                slow: self.kama_slow,
            },
            IndicatorKey::Adx {
                length: self.adx_length,
                smoothing: self.adx_smoothing,
            },
            IndicatorKey::Atr(self.atr_length),
        ]
    }

    fn stop_loss(&self) -> Option<StopLoss> {
        self.stop_loss
    }

    fn entry_signal(&self, ctx: &BarContext<'_>) -> Option<EntryContext> {
        let (prev_kama, kama) = ctx.indicators.pair(KAMA, ctx.index)?;
        let prev_close = ctx.prev_bar()?.close;
        let close = ctx.bar().close;
        let adx = ctx.indicators.at(ADX, ctx.index)?;

        let crossed = prev_close <= prev_kama && close > kama;
        if !crossed || adx <= self.adx_threshold {
            return None;
        }
        Some(EntryContext::with_stop(self.stop_level(ctx)?))
    }

    fn exit_signal(&self, ctx: &BarContext<'_>, position: &mut Position) -> Option<ExitSignal> {
        let close = ctx.bar().close;

        if let Some(stop) = position.trailing_stop {
            if close < stop {
                return Some(ExitSignal {
                    reason: ExitReason::TrailingStop,
                    price: close,
                });
            }
        }

        if let Some((prev_kama, kama)) = ctx.indicators.pair(KAMA, ctx.index) {
            let prev_close = ctx.prev_bar().map(|b| b.close).unwrap_or(close);
            if prev_close >= prev_kama && close < kama {
                return Some(ExitSignal {
                    reason: ExitReason::Signal,
                    price: close,
                });
            }
        }

        if let Some(level) = self.stop_level(ctx) {
            position.ratchet_stop(level);
        }
        None
    }
}
