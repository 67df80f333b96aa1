//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded with the SMA of its first `signal` values
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: line is invalid for the first (slow - 1) bars, signal for (slow - 1 + signal - 1).

use super::IndicatorSeries;
use super::ema::ema_raw;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn macd_line(values: &[f64], fast: usize, slow: usize) -> IndicatorSeries {
    if fast == 0 || slow == 0 || values.len() < slow {
        return IndicatorSeries::empty(values.len());
    }
    let fast_ema = ema_raw(values, fast);
    let slow_ema = ema_raw(values, slow);
    let line = fast_ema
        .iter()
        .zip(&slow_ema)
        .skip(slow - 1)
        .map(|(f, s)| f - s)
        .collect();
    IndicatorSeries::new(slow - 1, line)
}

pub fn macd_signal(values: &[f64], fast: usize, slow: usize, signal: usize) -> IndicatorSeries {
    let line = macd_line(values, fast, slow);
    if signal == 0 || line.values.len() < signal {
        return IndicatorSeries::empty(values.len());
    }

    let k = 2.0 / (signal as f64 + 1.0);
    let mut out = Vec::with_capacity(line.values.len() - signal + 1);
    let mut prev = line.values[..signal].iter().sum::<f64>() / signal as f64;
    out.push(prev);
    for &v in &line.values[signal..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }

    IndicatorSeries::new(line.offset + signal - 1, out)
}
