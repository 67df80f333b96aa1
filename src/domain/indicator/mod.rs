//! Technical indicator implementations.
//!
//! Every indicator is a pure function over numeric sequences producing an
//! [`IndicatorSeries`]: a value array aligned to a suffix of the input. The
//! series starts at `offset`, so `values[k]` belongs to input index
//! `offset + k`. Lookups go through [`IndicatorSeries::get`], which bounds
//! checks against both ends instead of trusting callers to line arrays up.
//!
//! - `IndicatorKey`: indicator identity + parameters (serves as cache key)
//! - `IndicatorSeries`: suffix-aligned output of one indicator

pub mod adx;
pub mod atr;
pub mod donchian;
pub mod ema;
pub mod kama;
pub mod macd;
pub mod percentile;
pub mod rsi;

pub use adx::adx;
pub use atr::{atr, normalized_atr};
pub use donchian::{donchian_lower, donchian_upper};
pub use ema::ema;
pub use kama::kama;
pub use macd::{macd_line, macd_signal};
pub use percentile::{percentile_rank, DEFAULT_MIN_WINDOW};
pub use rsi::rsi;

use crate::domain::ohlcv::PriceSeries;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub offset: usize,
    pub values: Vec<f64>,
}

impl IndicatorSeries {
    pub fn new(offset: usize, values: Vec<f64>) -> Self {
        Self { offset, values }
    }

    /// A series with no valid values for an input of `input_len` bars.
    pub fn empty(input_len: usize) -> Self {
        Self {
            offset: input_len,
            values: Vec::new(),
        }
    }

    /// Value at input index `i`, or `None` while warming up or past the end.
    pub fn get(&self, i: usize) -> Option<f64> {
        if i < self.offset {
            return None;
        }
        self.values.get(i - self.offset).copied()
    }

    /// Input index one past the last value.
    pub fn end(&self) -> usize {
        self.offset + self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorKey {
    Ema(usize),
    Atr(usize),
    NormalizedAtr(usize),
    /// Percentile rank of normalized ATR over a trailing window.
    VolatilityRank { atr_length: usize, window: usize },
    Rsi(usize),
    Adx { length: usize, smoothing: usize },
    Kama { length: usize, fast: usize, slow: usize },
    MacdLine { fast: usize, slow: usize },
    MacdSignal { fast: usize, slow: usize, signal: usize },
    DonchianUpper(usize),
    DonchianLower(usize),
}

impl IndicatorKey {
    /// Compute this indicator over `series`.
    pub fn compute(&self, series: &PriceSeries) -> IndicatorSeries {
        match *self {
            IndicatorKey::Ema(period) => ema(&series.closes(), period),
            IndicatorKey::Atr(period) => {
                atr(&series.highs(), &series.lows(), &series.closes(), period)
            }
            IndicatorKey::NormalizedAtr(period) => {
                normalized_atr(&series.highs(), &series.lows(), &series.closes(), period)
            }
            IndicatorKey::VolatilityRank { atr_length, window } => {
                let natr =
                    normalized_atr(&series.highs(), &series.lows(), &series.closes(), atr_length);
                percentile_rank(&natr, window, DEFAULT_MIN_WINDOW)
            }
            IndicatorKey::Rsi(period) => rsi(&series.closes(), period),
            IndicatorKey::Adx { length, smoothing } => adx(
                &series.highs(),
                &series.lows(),
                &series.closes(),
                length,
                smoothing,
            ),
            IndicatorKey::Kama { length, fast, slow } => {
                kama(&series.closes(), length, fast, slow)
            }
            IndicatorKey::MacdLine { fast, slow } => macd_line(&series.closes(), fast, slow),
            IndicatorKey::MacdSignal { fast, slow, signal } => {
                macd_signal(&series.closes(), fast, slow, signal)
            }
            IndicatorKey::DonchianUpper(length) => donchian_upper(&series.highs(), length),
            IndicatorKey::DonchianLower(length) => donchian_lower(&series.lows(), length),
        }
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKey::Ema(period) => write!(f, "EMA({})", period),
            IndicatorKey::Atr(period) => write!(f, "ATR({})", period),
            IndicatorKey::NormalizedAtr(period) => write!(f, "NATR({})", period),
            IndicatorKey::VolatilityRank { atr_length, window } => {
                write!(f, "VOLRANK({},{})", atr_length, window)
            }
            IndicatorKey::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorKey::Adx { length, smoothing } => write!(f, "ADX({},{})", length, smoothing),
            IndicatorKey::Kama { length, fast, slow } => {
                write!(f, "KAMA({},{},{})", length, fast, slow)
            }
            IndicatorKey::MacdLine { fast, slow } => write!(f, "MACD({},{})", fast, slow),
            IndicatorKey::MacdSignal { fast, slow, signal } => {
                write!(f, "MACD_SIGNAL({},{},{})", fast, slow, signal)
            }
            IndicatorKey::DonchianUpper(length) => write!(f, "DONCHIAN_UPPER({})", length),
            IndicatorKey::DonchianLower(length) => write!(f, "DONCHIAN_LOWER({})", length),
        }
    }
}
