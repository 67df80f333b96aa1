//! Oscillator band strategies: RSI band crosses and MACD/signal crosses.

use super::{stop_loss_param, BarContext, StopLoss, Strategy, STOP_LOSS_SPEC};
use crate::domain::error::AdaptraderError;
use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::indicator::IndicatorKey;
use crate::domain::params::{Constraint, ParamSpec, ParameterSet};
use crate::domain::position::{EntryContext, ExitReason, ExitSignal, Position};

pub const RSI_PARAMS: &[ParamSpec] = &[
    ParamSpec::period("rsi_length", 14),
    ParamSpec::percentile("rsi_oversold", 30),
    ParamSpec::percentile("rsi_overbought", 70),
    STOP_LOSS_SPEC,
];

pub const MACD_PARAMS: &[ParamSpec] = &[
    ParamSpec::period("macd_fast", DEFAULT_FAST as i64),
    ParamSpec::period("macd_slow", DEFAULT_SLOW as i64),
    ParamSpec::period("macd_signal", DEFAULT_SIGNAL as i64),
    STOP_LOSS_SPEC,
];

pub fn rsi_constraints() -> Vec<Constraint> {
    vec![Constraint::less_than("rsi_oversold", "rsi_overbought")]
}

pub fn macd_constraints() -> Vec<Constraint> {
    vec![Constraint::less_than("macd_fast", "macd_slow")]
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Enter when RSI crosses up through `oversold`, exit when it crosses
    /// down through `overbought`.
    Rsi {
        length: usize,
        oversold: f64,
        overbought: f64,
    },
    /// Enter when the MACD line crosses above its signal line, exit on the
    /// cross back below.
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Oscillator {
    pub mode: Mode,
    pub stop_loss: Option<StopLoss>,
}

impl Oscillator {
    pub fn rsi_from_params(params: &ParameterSet) -> Result<Self, AdaptraderError> {
        Ok(Oscillator {
            mode: Mode::Rsi {
                length: params.period("rsi_length")?,
                oversold: params.number("rsi_oversold")?,
                overbought: params.number("rsi_overbought")?,
            },
            stop_loss: stop_loss_param(params)?,
        })
    }

    pub fn macd_from_params(params: &ParameterSet) -> Result<Self, AdaptraderError> {
        Ok(Oscillator {
            mode: Mode::Macd {
                fast: params.period("macd_fast")?,
                slow: params.period("macd_slow")?,
                signal: params.period("macd_signal")?,
            },
            stop_loss: stop_loss_param(params)?,
        })
    }
}

impl Strategy for Oscillator {
    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Rsi { .. } => "rsi",
            Mode::Macd { .. } => "macd",
        }
    }

    fn indicator_keys(&self) -> Vec<IndicatorKey> {
        match self.mode {
            Mode::Rsi { length, .. } => vec![IndicatorKey::Rsi(length)],
            Mode::Macd { fast, slow, signal } => vec![
                IndicatorKey::MacdLine { fast, slow },
                IndicatorKey::MacdSignal { fast, slow, signal },
            ],
        }
    }

    fn stop_loss(&self) -> Option<StopLoss> {
        self.stop_loss
    }

    fn entry_signal(&self, ctx: &BarContext<'_>) -> Option<EntryContext> {
        let fired = match self.mode {
            Mode::Rsi { oversold, .. } => {
                let (prev, cur) = ctx.indicators.pair(0, ctx.index)?;
                prev <= oversold && cur > oversold
            }
            Mode::Macd { .. } => ctx.crossed_above(0, 1),
        };
        fired.then(EntryContext::default)
    }

    fn exit_signal(&self, ctx: &BarContext<'_>, _position: &mut Position) -> Option<ExitSignal> {
        let fired = match self.mode {
            Mode::Rsi { overbought, .. } => {
                let (prev, cur) = ctx.indicators.pair(0, ctx.index)?;
                prev >= overbought && cur < overbought
            }
            Mode::Macd { .. } => ctx.crossed_below(0, 1),
        };
        fired.then(|| ExitSignal {
            reason: ExitReason::Signal,
            price: ctx.bar().close,
        })
    }
}
