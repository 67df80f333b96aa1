//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the first value, then EMA[i] = V[i]*k + EMA[i-1]*(1-k).
//! Warmup: none, the series is valid from index 0.

use super::IndicatorSeries;

pub fn ema(values: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 || values.is_empty() {
        return IndicatorSeries::empty(values.len());
    }

    IndicatorSeries::new(0, ema_raw(values, period))
}

/// EMA over every input value; shared with MACD.
pub(crate) fn ema_raw(values: &[f64], period: usize) -> Vec<f64> {
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = match values.first() {
        Some(&v) => v,
        None => return out,
    };
    out.push(prev);
    for &v in &values[1..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_seed_is_first_value() {
        let series = ema(&[10.0, 20.0, 30.0], 3);
        assert_eq!(series.offset, 0);
        assert!((series.get(0).unwrap() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_period_1_tracks_input() {
        let series = ema(&[10.0, 20.0, 30.0], 1);
        for (i, expected) in [10.0, 20.0, 30.0].iter().enumerate() {
            assert!((series.get(i).unwrap() - expected).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ema_recursive_calculation() {
        let series = ema(&[1.0, 2.0, 3.0, 4.0], 3);
        // k = 0.5: 1, 1.5, 2.25, 3.125
        let expected = [1.0, 1.5, 2.25, 3.125];
        for (i, e) in expected.iter().enumerate() {
            assert!((series.get(i).unwrap() - e).abs() < 1e-12);
        }
    }

    #[test]
    fn ema_equal_prices() {
        let series = ema(&[100.0; 5], 3);
        for i in 0..5 {
            assert!((series.get(i).unwrap() - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ema_empty_input() {
        let series = ema(&[], 3);
        assert!(series.is_empty());
    }

    #[test]
    fn ema_period_0() {
        let series = ema(&[10.0, 20.0], 0);
        assert!(series.is_empty());
        assert_eq!(series.get(0), None);
    }

    #[test]
    fn ema_lags_a_rising_series() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let fast = ema(&values, 3);
        let slow = ema(&values, 10);
        for i in 1..20 {
            assert!(fast.get(i).unwrap() > slow.get(i).unwrap());
            assert!(fast.get(i).unwrap() < values[i]);
        }
    }
}
