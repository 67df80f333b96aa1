//! Trailing-window percentile rank.
//!
//! rank[i] = count(window <= V[i]) / len(window) * 100, where the window is the
//! last `window_length` valid values ending at i. Invalid until the window
//! holds at least `min_window` samples. The `<=` count convention is what the
//! regime thresholds are tuned against; do not swap in an interpolated
//! percentile.

use super::IndicatorSeries;

pub const DEFAULT_MIN_WINDOW: usize = 20;

pub fn percentile_rank(
    input: &IndicatorSeries,
    window_length: usize,
    min_window: usize,
) -> IndicatorSeries {
    let min_window = min_window.max(1);
    if window_length == 0 || min_window > window_length || input.values.len() < min_window {
        return IndicatorSeries::empty(input.end());
    }

    let values = &input.values;
    let mut out = Vec::with_capacity(values.len() - min_window + 1);
    for k in (min_window - 1)..values.len() {
        let start = (k + 1).saturating_sub(window_length);
        let window = &values[start..=k];
        let current = values[k];
        if current.is_nan() {
            out.push(f64::NAN);
            continue;
        }
        let at_or_below = window.iter().filter(|&&v| v <= current).count();
        out.push(at_or_below as f64 / window.len() as f64 * 100.0);
    }

    IndicatorSeries::new(input.offset + min_window - 1, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_of_maximum_is_100() {
        let input = IndicatorSeries::new(0, vec![1.0, 2.0, 3.0, 4.0]);
        let ranks = percentile_rank(&input, 4, 1);
        assert!((ranks.get(3).unwrap() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rank_counts_ties_as_at_or_below() {
        let input = IndicatorSeries::new(0, vec![2.0, 2.0, 1.0, 2.0]);
        let ranks = percentile_rank(&input, 4, 4);
        // all four values <= 2.0
        assert!((ranks.get(3).unwrap() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rank_of_minimum_is_one_over_window() {
        let input = IndicatorSeries::new(0, vec![4.0, 3.0, 2.0, 1.0]);
        let ranks = percentile_rank(&input, 4, 4);
        assert!((ranks.get(3).unwrap() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sentinel_until_min_window() {
        let input = IndicatorSeries::new(5, (0..30).map(|i| i as f64).collect());
        let ranks = percentile_rank(&input, 50, 20);
        assert_eq!(ranks.offset, 24);
        assert_eq!(ranks.get(23), None);
        assert!(ranks.get(24).is_some());
        assert_eq!(ranks.end(), 35);
    }

    #[test]
    fn window_slides() {
        // window of 3: at index 4 window is [5, 1, 3] → 3 is rank 2/3
        let input = IndicatorSeries::new(0, vec![9.0, 9.0, 5.0, 1.0, 3.0]);
        let ranks = percentile_rank(&input, 3, 1);
        assert!((ranks.get(4).unwrap() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn too_short_input_is_empty() {
        let input = IndicatorSeries::new(0, vec![1.0; 5]);
        let ranks = percentile_rank(&input, 10, 20);
        assert!(ranks.is_empty());
    }

    #[test]
    fn values_within_bounds() {
        let input = IndicatorSeries::new(
            0,
            (0..100).map(|i| ((i as f64) * 1.3).sin()).collect(),
        );
        let ranks = percentile_rank(&input, 30, 20);
        for v in &ranks.values {
            assert!(*v > 0.0 && *v <= 100.0);
        }
    }
}
