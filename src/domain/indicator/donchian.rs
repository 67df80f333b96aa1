//! Donchian channel: highest high / lowest low over the last n bars (inclusive).
//! Warmup: first (n-1) bars are invalid.

use super::IndicatorSeries;

pub fn donchian_upper(high: &[f64], length: usize) -> IndicatorSeries {
    rolling(high, length, f64::max)
}

pub fn donchian_lower(low: &[f64], length: usize) -> IndicatorSeries {
    rolling(low, length, f64::min)
}

fn rolling(values: &[f64], length: usize, pick: fn(f64, f64) -> f64) -> IndicatorSeries {
    if length == 0 || values.len() < length {
        return IndicatorSeries::empty(values.len());
    }
    let out = values
        .windows(length)
        .map(|w| w[1..].iter().fold(w[0], |acc, &v| pick(acc, v)))
        .collect();
    IndicatorSeries::new(length - 1, out)
}
