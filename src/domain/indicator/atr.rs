//! Average True Range and normalized ATR.
//!
//! TR[0] = high - low, TR[i] = max(high-low, |high-prevClose|, |low-prevClose|).
//! ATR is the EMA of TR: k = 2/(n+1), seeded with TR[0].
//! Warmup: none, the series is valid from index 0. Volatility-rank thresholds
//! are tuned against this smoothing.

use super::IndicatorSeries;
use super::ema::ema_raw;

pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let len = high.len().min(low.len()).min(close.len());
    (0..len)
        .map(|i| {
            let hl = high[i] - low[i];
            if i == 0 {
                hl
            } else {
                let hc = (high[i] - close[i - 1]).abs();
                let lc = (low[i] - close[i - 1]).abs();
                hl.max(hc).max(lc)
            }
        })
        .collect()
}

pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorSeries {
    let tr = true_range(high, low, close);
    if period == 0 || tr.is_empty() {
        return IndicatorSeries::empty(tr.len());
    }

    IndicatorSeries::new(0, ema_raw(&tr, period))
}

/// ATR as a percentage of close: ATR / close * 100.
pub fn normalized_atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorSeries {
    let raw = atr(high, low, close, period);
    let values = raw
        .values
        .iter()
        .enumerate()
        .map(|(k, &a)| {
            let c = close[raw.offset + k];
            if c != 0.0 { a / c * 100.0 } else { f64::NAN }
        })
        .collect();
    IndicatorSeries::new(raw.offset, values)
}
