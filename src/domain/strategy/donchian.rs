//! Donchian channel breakout with an ATR margin and ADX confirmation.
//!
//! Channel levels are read from the previous bar so the current bar's own
//! high or low never moves the level it is tested against.

use super::{stop_loss_param, BarContext, StopLoss, Strategy, STOP_LOSS_SPEC};
use crate::domain::error::AdaptraderError;
use crate::domain::indicator::IndicatorKey;
use crate::domain::params::{Constraint, ParamSpec, ParameterSet};
use crate::domain::position::{EntryContext, ExitReason, ExitSignal, Position};

pub const PARAMS: &[ParamSpec] = &[
    ParamSpec::period("donchian_length", 20),
    ParamSpec::period("atr_length", 14),
    ParamSpec::float("atr_multiplier", 0.5, 0.0, 10.0),
    ParamSpec::period("adx_length", 14),
    ParamSpec::period("adx_smoothing", 14),
    ParamSpec::float("adx_threshold", 20.0, 0.0, 100.0),
    STOP_LOSS_SPEC,
];

pub fn constraints() -> Vec<Constraint> {
    Vec::new()
}

const UPPER: usize = 0;
const LOWER: usize = 1;
const ATR: usize = 2;
const ADX: usize = 3;

#[derive(Debug, Clone)]
pub struct Donchian {
    pub donchian_length: usize,
    pub atr_length: usize,
    pub atr_multiplier: f64,
    pub adx_length: usize,
    pub adx_smoothing: usize,
    pub adx_threshold: f64,
    pub stop_loss: Option<StopLoss>,
}

impl Donchian {
    pub fn from_params(params: &ParameterSet) -> Result<Self, AdaptraderError> {
        let atr_multiplier = params.number("atr_multiplier")?;
        let adx_threshold = params.number("adx_threshold")?;
        if atr_multiplier < 0.0 || adx_threshold < 0.0 {
            return Err(AdaptraderError::invalid_params(
                "atr_multiplier and adx_threshold must be non-negative",
            ));
        }
        Ok(Donchian {
            donchian_length: params.period("donchian_length")?,
            atr_length: params.period("atr_length")?,
            atr_multiplier,
            adx_length: params.period("adx_length")?,
            adx_smoothing: params.period("adx_smoothing")?,
            adx_threshold,
            stop_loss: stop_loss_param(params)?,
        })
    }
}

impl Strategy for Donchian {
    fn name(&self) -> &'static str {
        "donchian"
    }

    fn indicator_keys(&self) -> Vec<IndicatorKey> {
        vec![
            IndicatorKey::DonchianUpper(self.donchian_length),
            IndicatorKey::DonchianLower(self.donchian_length),
            IndicatorKey::Atr(self.atr_length),
            IndicatorKey::Adx {
                length: self.adx_length,
                smoothing: self.adx_smoothing,
            },
        ]
    }

    fn stop_loss(&self) -> Option<StopLoss> {
        self.stop_loss
    }

    fn entry_signal(&self, ctx: &BarContext<'_>) -> Option<EntryContext> {
        let prev = ctx.index.checked_sub(1)?;
        let upper = ctx.indicators.at(UPPER, prev)?;
        let atr = ctx.indicators.at(ATR, prev)?;
        let adx = ctx.indicators.at(ADX, ctx.index)?;
        let threshold = upper + atr * self.atr_multiplier;
        (ctx.bar().high > threshold && adx >= self.adx_threshold).then(EntryContext::default)
    }

    fn exit_signal(&self, ctx: &BarContext<'_>, _position: &mut Position) -> Option<ExitSignal> {
        let prev = ctx.index.checked_sub(1)?;
        let lower = ctx.indicators.at(LOWER, prev)?;
        (ctx.bar().low < lower).then(|| ExitSignal {
            reason: ExitReason::Signal,
            price: ctx.bar().close,
        })
    }
}
