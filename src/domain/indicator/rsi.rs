//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are invalid (need n price changes to compute initial average).

use super::IndicatorSeries;

pub fn rsi(values: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 || values.len() <= period {
        return IndicatorSeries::empty(values.len());
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = values
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period);
    out.push(rsi_value(avg_gain, avg_loss));

    for k in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[k]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[k]) / period as f64;
        out.push(rsi_value(avg_gain, avg_loss));
    }

    IndicatorSeries::new(period, out)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
