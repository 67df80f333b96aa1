//! ADX (Average Directional Index, Wilder).
//!
//! 1. +DM = up move if it exceeds the down move and is positive, else 0 (and vice versa for -DM)
//! 2. Wilder-average TR, +DM and -DM over `length` bars (seeded with the mean of bars 1..=length)
//! 3. +DI = 100 * avg(+DM) / avg(TR), -DI likewise
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 5. ADX = Wilder average of DX over `smoothing` bars
//!
//! Warmup: first (length + smoothing - 1) bars are invalid.

use super::IndicatorSeries;
use super::atr::true_range;

pub fn adx(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    length: usize,
    smoothing: usize,
) -> IndicatorSeries {
    let n = high.len().min(low.len()).min(close.len());
    if length == 0 || smoothing == 0 || n < length + smoothing {
        return IndicatorSeries::empty(n);
    }

    let tr = true_range(high, low, close);
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let smooth_tr = wilder_average(&tr, 1, length);
    let smooth_plus = wilder_average(&plus_dm, 1, length);
    let smooth_minus = wilder_average(&minus_dm, 1, length);

    // smoothed arrays are indexed from `length`
    let dx: Vec<f64> = (0..smooth_tr.len())
        .map(|k| {
            let atr = smooth_tr[k];
            if atr == 0.0 {
                return 0.0;
            }
            let plus_di = 100.0 * smooth_plus[k] / atr;
            let minus_di = 100.0 * smooth_minus[k] / atr;
            let sum = plus_di + minus_di;
            if sum == 0.0 {
                0.0
            } else {
                100.0 * (plus_di - minus_di).abs() / sum
            }
        })
        .collect();

    let values = wilder_average(&dx, 0, smoothing);
    IndicatorSeries::new(length + smoothing - 1, values)
}

/// Wilder average of `values[start..]`: seed with the mean of the first
/// `period` values, then avg = (prev * (period-1) + v) / period. The output
/// starts at `values[start + period - 1]`.
fn wilder_average(values: &[f64], start: usize, period: usize) -> Vec<f64> {
    let data = &values[start.min(values.len())..];
    if data.len() < period {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(data.len() - period + 1);
    let mut prev = data[..period].iter().sum::<f64>() / period as f64;
    out.push(prev);
    for &v in &data[period..] {
        prev = (prev * (period - 1) as f64 + v) / period as f64;
        out.push(prev);
    }
    out
}
