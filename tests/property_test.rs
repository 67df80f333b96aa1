//! Property tests for sweep and accounting invariants.
//!
//! Uses proptest to verify:
//! 1. Parameter-space size is the product of axis lengths
//! 2. Constraint filtering matches a brute-force count
//! 3. Drawdown stays within [0, 100] and equity conserves trade P&L
//! 4. Trailing stops only ratchet upward

mod common;

use adaptrader::domain::backtest::{self, BacktestConfig};
use adaptrader::domain::param_space::ParameterSpace;
use adaptrader::domain::params::{Constraint, ParamValue, ParameterSet};
use adaptrader::domain::position::{EntryContext, Position};
use adaptrader::domain::strategy::StrategyKind;
use common::{series, ts};
use proptest::prelude::*;

// ── Generators ───────────────────────────────────────────────────────

fn arb_axis() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(1i64..40, 1..6).prop_map(|s| s.into_iter().collect())
}

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-3.0..3.0_f64, 30..160).prop_map(|steps| {
        let mut price = 100.0;
        steps
            .into_iter()
            .map(|step| {
                price = (price + step).max(1.0);
                price
            })
            .collect()
    })
}

fn to_values(values: &[i64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Int(v)).collect()
}

// ── 1/2. Parameter space ─────────────────────────────────────────────

proptest! {
    #[test]
    fn unconstrained_count_is_axis_product(
        a in arb_axis(),
        b in arb_axis(),
        c in arb_axis(),
    ) {
        let space = ParameterSpace::new(Vec::new(), u64::MAX)
            .axis("a", to_values(&a))
            .axis("b", to_values(&b))
            .axis("c", to_values(&c));
        let expected = (a.len() * b.len() * c.len()) as u64;
        prop_assert_eq!(space.total_combinations(), expected);

        let enumeration = space.enumerate().unwrap();
        prop_assert_eq!(enumeration.total_combinations, expected);
        prop_assert_eq!(enumeration.valid() as u64, expected);
    }

    #[test]
    fn constrained_count_matches_brute_force(fast in arb_axis(), slow in arb_axis()) {
        let constraint = Constraint::less_than("fast", "slow");
        let space = ParameterSpace::new(vec![constraint.clone()], u64::MAX)
            .axis("fast", to_values(&fast))
            .axis("slow", to_values(&slow));
        let enumeration = space.enumerate().unwrap();

        let brute = fast
            .iter()
            .flat_map(|&f| slow.iter().map(move |&s| (f, s)))
            .filter(|&(f, s)| f < s)
            .count();
        prop_assert_eq!(enumeration.valid(), brute);
        prop_assert_eq!(enumeration.rejected(), (fast.len() * slow.len() - brute) as u64);
        for params in &enumeration.candidates {
            prop_assert!(constraint.holds(params));
        }
    }

    #[test]
    fn ceiling_rejects_every_oversized_space(a in arb_axis(), b in arb_axis()) {
        let total = (a.len() * b.len()) as u64;
        let space = ParameterSpace::new(Vec::new(), total - 1)
            .axis("a", to_values(&a))
            .axis("b", to_values(&b));
        prop_assert!(space.enumerate().is_err());
    }
}

// ── 3. Backtest accounting ───────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn drawdown_bounded_and_equity_conserved(
        closes in arb_closes(),
        fast in 2i64..6,
        gap in 1i64..10,
        stop in prop_oneof![Just(0.0), 0.5..10.0_f64],
    ) {
        let prices = series("RND", &closes);
        let params = ParameterSet::new()
            .with_int("fast_length", fast)
            .with_int("slow_length", fast + gap)
            .with_float("stop_loss_pct", stop);
        let result = backtest::run(
            &prices,
            StrategyKind::EmaCross,
            &params,
            &BacktestConfig::default(),
        )
        .unwrap();

        let dd = result.metrics.max_drawdown;
        prop_assert!((0.0..=100.0).contains(&dd), "drawdown {}", dd);

        let pnl: f64 = result.trades.iter().map(|t| t.pnl).sum();
        prop_assert_eq!(result.final_equity(), result.initial_capital + pnl);

        for pair in result.trades.windows(2) {
            prop_assert!(pair[0].exit_index < pair[1].entry_index);
        }
    }
}

// ── 4. Ratchet monotonicity ──────────────────────────────────────────

proptest! {
    #[test]
    fn ratchet_never_lowers(
        initial in 50.0..150.0_f64,
        proposals in prop::collection::vec(prop_oneof![Just(f64::NAN), 0.0..200.0_f64], 1..40),
    ) {
        let mut pos = Position::open(0, ts(0), 100.0, 1.0, EntryContext::with_stop(initial));
        let mut previous = initial;
        for proposed in proposals {
            let level = pos.ratchet_stop(proposed);
            prop_assert!(level >= previous);
            prop_assert_eq!(pos.trailing_stop, Some(level));
            previous = level;
        }
    }
}
