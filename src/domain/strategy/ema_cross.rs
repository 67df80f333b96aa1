//! Plain fast/slow EMA crossover.

use super::{stop_loss_param, BarContext, StopLoss, Strategy, STOP_LOSS_SPEC};
use crate::domain::error::AdaptraderError;
use crate::domain::indicator::IndicatorKey;
use crate::domain::params::{Constraint, ParamSpec, ParameterSet};
use crate::domain::position::{EntryContext, ExitReason, ExitSignal, Position};

pub const PARAMS: &[ParamSpec] = &[
    ParamSpec::period("fast_length", 9),
    ParamSpec::period("slow_length", 21),
    STOP_LOSS_SPEC,
];

pub fn constraints() -> Vec<Constraint> {
    vec![Constraint::less_than("fast_length", "slow_length")]
}

const FAST: usize = 0;
const SLOW: usize = 1;

#[derive(Debug, Clone)]
pub struct EmaCross {
    pub fast_length: usize,
    pub slow_length: usize,
    pub stop_loss: Option<StopLoss>,
}

impl EmaCross {
    pub fn from_params(params: &ParameterSet) -> Result<Self, AdaptraderError> {
        Ok(EmaCross {
            fast_length: params.period("fast_length")?,
            slow_length: params.period("slow_length")?,
            stop_loss: stop_loss_param(params)?,
        })
    }
}

impl Strategy for EmaCross {
    fn name(&self) -> &'static str {
        "ema_cross"
    }

    fn indicator_keys(&self) -> Vec<IndicatorKey> {
        vec![
            IndicatorKey::Ema(self.fast_length),
            IndicatorKey::Ema(self.slow_length),
        ]
    }

    fn stop_loss(&self) -> Option<StopLoss> {
        self.stop_loss
    }

    fn entry_signal(&self, ctx: &BarContext<'_>) -> Option<EntryContext> {
        ctx.crossed_above(FAST, SLOW).then(EntryContext::default)
    }

    fn exit_signal(&self, ctx: &BarContext<'_>, _position: &mut Position) -> Option<ExitSignal> {
        ctx.crossed_below(FAST, SLOW).then(|| ExitSignal {
            reason: ExitReason::Signal,
            price: ctx.bar().close,
        })
    }
}
