//! Kaufman Adaptive Moving Average.
//!
//! ER = |V[i] - V[i-n]| / sum(|V[j] - V[j-1]|) over the last n changes
//! SC = (ER * (2/(fast+1) - 2/(slow+1)) + 2/(slow+1))^2
//! KAMA[i] = KAMA[i-1] + SC * (V[i] - KAMA[i-1]), seeded with V[n-1].
//! Warmup: first n bars are invalid.

use super::IndicatorSeries;

pub fn kama(values: &[f64], length: usize, fast: usize, slow: usize) -> IndicatorSeries {
    if length == 0 || fast == 0 || slow == 0 || values.len() <= length {
        return IndicatorSeries::empty(values.len());
    }

    let fast_sc = 2.0 / (fast as f64 + 1.0);
    let slow_sc = 2.0 / (slow as f64 + 1.0);

    let mut out = Vec::with_capacity(values.len() - length);
    let mut prev = values[length - 1];
    for i in length..values.len() {
        let er = efficiency_ratio(&values[i - length..=i]);
        let sc = (er * (fast_sc - slow_sc) + slow_sc).powi(2);
        prev += sc * (values[i] - prev);
        out.push(prev);
    }

    IndicatorSeries::new(length, out)
}

/// Net change over total path length of `window`; 0 for a flat window.
pub fn efficiency_ratio(window: &[f64]) -> f64 {
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return 0.0;
    };
    let direction = (last - first).abs();
    let volatility: f64 = window.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    if volatility > 0.0 {
        direction / volatility
    } else {
        0.0
    }
}
