//! Grid-search optimizer.
//!
//! Enumerates a [`ParameterSpace`], prefills one shared [`IndicatorCache`]
//! with every indicator any candidate reads, then backtests all candidates
//! in parallel against that read-only cache. Candidates that fail or fall
//! outside the validity filters are counted and dropped. The best valid
//! candidate (highest score, earliest enumeration index on ties) is re-run
//! to produce the full result.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::backtest::{run_with_cache, BacktestConfig, BacktestResult};
use super::error::AdaptraderError;
use super::indicator_cache::IndicatorCache;
use super::ohlcv::PriceSeries;
use super::param_space::ParameterSpace;
use super::params::ParameterSet;
use super::strategy::{Strategy, StrategyKind};

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub min_trades: usize,
    /// Percent; candidates with a deeper drawdown are invalid.
    pub max_drawdown: f64,
    /// Percent return at the midpoint of the window; disabled when `None`.
    pub min_early_return: Option<f64>,
    pub top_n: usize,
    pub parallel: bool,
    /// Worker threads; rayon's global pool when `None`.
    pub threads: Option<usize>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            min_trades: 1,
            max_drawdown: 50.0,
            min_early_return: None,
            top_n: 10,
            parallel: true,
            threads: None,
        }
    }
}

/// Why a candidate was not considered for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NonFiniteReturn,
    TooFewTrades,
    DrawdownTooDeep,
    EarlyReturnTooLow,
    /// Non-finite metrics other than return.
    Degenerate,
    /// The candidate's strategy or backtest returned an error.
    Failed,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::NonFiniteReturn => "non-finite return",
            RejectReason::TooFewTrades => "too few trades",
            RejectReason::DrawdownTooDeep => "drawdown too deep",
            RejectReason::EarlyReturnTooLow => "early return too low",
            RejectReason::Degenerate => "degenerate metrics",
            RejectReason::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepStats {
    /// Cartesian product size before constraints.
    pub total_combinations: u64,
    /// Candidates that satisfied the constraints and were backtested.
    pub candidates: usize,
    pub valid: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
    pub indicators_computed: usize,
}

impl SweepStats {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// Headline figures of one valid candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub rank: usize,
    /// Position in enumeration order.
    pub index: usize,
    pub params: ParameterSet,
    pub score: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub calmar_ratio: f64,
    pub profit_factor: f64,
    pub win_rate: f64,
    pub total_trades: usize,
}

impl RankedCandidate {
    fn from_result(index: usize, result: &BacktestResult) -> Self {
        let m = &result.metrics;
        RankedCandidate {
            rank: 0,
            index,
            params: result.params.clone(),
            score: m.score,
            total_return: m.total_return,
            max_drawdown: m.max_drawdown,
            sharpe_ratio: m.sharpe_ratio,
            calmar_ratio: m.calmar_ratio,
            profit_factor: m.profit_factor,
            win_rate: m.win_rate,
            total_trades: m.total_trades,
        }
    }

    /// Higher score first; earlier enumeration index breaks ties.
    fn ranking(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(self.index.cmp(&other.index))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub best: BacktestResult,
    pub best_params: ParameterSet,
    pub best_score: f64,
    pub top: Vec<RankedCandidate>,
    pub stats: SweepStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizationOutcome {
    Found(Box<OptimizationResult>),
    /// Every candidate was rejected. Not an error: the sweep ran to completion.
    NoValidResults(SweepStats),
}

impl OptimizationOutcome {
    pub fn stats(&self) -> &SweepStats {
        match self {
            OptimizationOutcome::Found(result) => &result.stats,
            OptimizationOutcome::NoValidResults(stats) => stats,
        }
    }

    pub fn best(&self) -> Option<&OptimizationResult> {
        match self {
            OptimizationOutcome::Found(result) => Some(result),
            OptimizationOutcome::NoValidResults(_) => None,
        }
    }
}

type Evaluation = Result<RankedCandidate, (RejectReason, Option<AdaptraderError>)>;

pub struct Optimizer {
    config: OptimizerConfig,
    backtest: BacktestConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig, backtest: BacktestConfig) -> Self {
        Optimizer { config, backtest }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Fails only on space-level or data-level problems: an oversized space,
    /// or a series too short for every candidate.
    pub fn optimize(
        &self,
        prices: &PriceSeries,
        kind: StrategyKind,
        space: &ParameterSpace,
    ) -> Result<OptimizationOutcome, AdaptraderError> {
        let enumeration = space.enumerate()?;
        info!(
            strategy = %kind,
            symbol = %prices.symbol,
            total = enumeration.total_combinations,
            valid = enumeration.valid(),
            "starting parameter sweep"
        );

        let defaults = kind.defaults();
        let candidates: Vec<ParameterSet> = enumeration
            .candidates
            .iter()
            .map(|params| defaults.merged(params))
            .collect();
        let strategies: Vec<Result<Box<dyn Strategy>, AdaptraderError>> =
            candidates.iter().map(|params| kind.build(params)).collect();

        let mut cache = IndicatorCache::new();
        let keys = strategies
            .iter()
            .flatten()
            .flat_map(|s| s.indicator_keys())
            .collect::<Vec<_>>();
        let indicators_computed = cache.prefill(prices, keys);
        debug!(indicators = indicators_computed, "indicator cache prefilled");

        let cache = &cache;
        let candidates = &candidates;
        let sweep = || -> Vec<Evaluation> {
            if self.config.parallel {
                strategies
                    .par_iter()
                    .enumerate()
                    .map(|(i, s)| self.evaluate(prices, i, &candidates[i], s, cache))
                    .collect()
            } else {
                strategies
                    .iter()
                    .enumerate()
                    .map(|(i, s)| self.evaluate(prices, i, &candidates[i], s, cache))
                    .collect()
            }
        };
        let evaluations = match (self.config.parallel, self.config.threads) {
            (true, Some(threads)) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| AdaptraderError::ConfigInvalid {
                    section: "optimize".to_string(),
                    key: "threads".to_string(),
                    reason: e.to_string(),
                })?
                .install(sweep),
            _ => sweep(),
        };

        let mut stats = SweepStats {
            total_combinations: enumeration.total_combinations,
            candidates: candidates.len(),
            indicators_computed,
            ..SweepStats::default()
        };
        let mut valid = Vec::new();
        let mut insufficient = None;
        let mut all_insufficient = !evaluations.is_empty();
        for evaluation in evaluations {
            match evaluation {
                Ok(candidate) => {
                    all_insufficient = false;
                    valid.push(candidate);
                }
                Err((reason, err)) => {
                    *stats.rejected.entry(reason).or_insert(0) += 1;
                    match err {
                        Some(e @ AdaptraderError::InsufficientData { .. }) => {
                            insufficient.get_or_insert(e);
                        }
                        _ => all_insufficient = false,
                    }
                }
            }
        }
        stats.valid = valid.len();

        if all_insufficient {
            if let Some(err) = insufficient {
                return Err(err);
            }
        }

        let best = valid
            .par_iter()
            .cloned()
            .reduce_with(|a, b| match a.ranking(&b) {
                Ordering::Greater => b,
                _ => a,
            });
        let Some(best) = best else {
            info!(
                candidates = stats.candidates,
                rejected = stats.rejected_total(),
                "sweep finished with no valid candidates"
            );
            return Ok(OptimizationOutcome::NoValidResults(stats));
        };

        valid.sort_by(|a, b| a.ranking(b));
        valid.truncate(self.config.top_n.max(1));
        for (rank, candidate) in valid.iter_mut().enumerate() {
            candidate.rank = rank + 1;
        }

        let strategy = match &strategies[best.index] {
            Ok(strategy) => strategy,
            Err(e) => return Err(AdaptraderError::invalid_params(e.to_string())),
        };
        let result =
            run_with_cache(prices, strategy.as_ref(), &best.params, cache, &self.backtest)?;
        info!(
            candidates = stats.candidates,
            valid = stats.valid,
            best_score = result.score(),
            best_params = %best.params,
            "sweep finished"
        );

        Ok(OptimizationOutcome::Found(Box::new(OptimizationResult {
            best_params: best.params,
            best_score: result.score(),
            best: result,
            top: valid,
            stats,
        })))
    }

    fn evaluate(
        &self,
        prices: &PriceSeries,
        index: usize,
        params: &ParameterSet,
        strategy: &Result<Box<dyn Strategy>, AdaptraderError>,
        cache: &IndicatorCache,
    ) -> Evaluation {
        let strategy = match strategy {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!(candidate = index, params = %params, error = %e, "candidate rejected");
                return Err((RejectReason::Failed, None));
            }
        };
        match run_with_cache(prices, strategy.as_ref(), params, cache, &self.backtest) {
            Ok(result) => match self.validate(&result) {
                Ok(()) => Ok(RankedCandidate::from_result(index, &result)),
                Err(reason) => Err((reason, None)),
            },
            Err(e) => {
                if !matches!(e, AdaptraderError::InsufficientData { .. }) {
                    warn!(candidate = index, params = %params, error = %e, "candidate failed");
                }
                Err((RejectReason::Failed, Some(e)))
            }
        }
    }

    /// Validity filters, checked in order.
    pub fn validate(&self, result: &BacktestResult) -> Result<(), RejectReason> {
        let m = &result.metrics;
        if !m.total_return.is_finite() {
            return Err(RejectReason::NonFiniteReturn);
        }
        if m.total_trades < self.config.min_trades {
            return Err(RejectReason::TooFewTrades);
        }
        if !(m.max_drawdown <= self.config.max_drawdown) {
            return Err(RejectReason::DrawdownTooDeep);
        }
        if let Some(min) = self.config.min_early_return {
            if !(result.early_return >= min) {
                return Err(RejectReason::EarlyReturnTooLow);
            }
        }
        if m.is_degenerate() {
            return Err(RejectReason::Degenerate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::params::{Constraint, ParamValue};
    use crate::domain::strategy::test_support::series_from_closes;

    fn rise_then_fall(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                let half = (n / 2) as f64;
                if x < half { 100.0 + x } else { 100.0 + 2.0 * half - x }
            })
            .collect()
    }

    fn ints(values: &[i64]) -> Vec<ParamValue> {
        values.iter().map(|&v| ParamValue::Int(v)).collect()
    }

    fn ema_space(fast: &[i64], slow: &[i64]) -> ParameterSpace {
        ParameterSpace::new(StrategyKind::EmaCross.constraints(), 10_000)
            .axis("fast_length", ints(fast))
            .axis("slow_length", ints(slow))
            .axis("stop_loss_pct", vec![ParamValue::Float(0.0)])
    }

    fn optimizer(parallel: bool) -> Optimizer {
        Optimizer::new(
            OptimizerConfig {
                parallel,
                ..OptimizerConfig::default()
            },
            BacktestConfig::default(),
        )
    }

    #[test]
    fn finds_best_and_reproduces_score() {
        let prices = series_from_closes(&rise_then_fall(120));
        let outcome = optimizer(true)
            .optimize(&prices, StrategyKind::EmaCross, &ema_space(&[2, 3, 4], &[8, 10, 12]))
            .unwrap();
        let result = outcome.best().unwrap();
        assert_eq!(result.stats.candidates, 9);
        assert_eq!(result.stats.valid + result.stats.rejected_total(), 9);

        let rerun = crate::domain::backtest::run(
            &prices,
            StrategyKind::EmaCross,
            &result.best_params,
            &BacktestConfig::default(),
        )
        .unwrap();
        assert_eq!(rerun.score(), result.best_score);
        assert_eq!(result.top[0].params, result.best_params);
        assert_eq!(result.top[0].rank, 1);
        assert!(result.top.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let prices = series_from_closes(&rise_then_fall(120));
        let space = ema_space(&[2, 3, 4, 5], &[8, 10, 12]);
        let a = optimizer(true)
            .optimize(&prices, StrategyKind::EmaCross, &space)
            .unwrap();
        let b = optimizer(false)
            .optimize(&prices, StrategyKind::EmaCross, &space)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ties_go_to_earliest_candidate() {
        // Two identical candidates: enumeration index 0 must win.
        let prices = series_from_closes(&rise_then_fall(120));
        let space = ParameterSpace::new(vec![], 100)
            .axis("fast_length", ints(&[3]))
            .axis("slow_length", ints(&[10]))
            .axis("stop_loss_pct", vec![ParamValue::Float(0.0), ParamValue::Int(0)]);
        let outcome = optimizer(true)
            .optimize(&prices, StrategyKind::EmaCross, &space)
            .unwrap();
        let result = outcome.best().unwrap();
        assert_eq!(result.top[0].index, 0);
        assert_eq!(result.best_params.get("stop_loss_pct"), Some(ParamValue::Float(0.0)));
    }

    #[test]
    fn no_valid_results_is_not_an_error() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let prices = series_from_closes(&closes);
        let opt = Optimizer::new(
            OptimizerConfig {
                min_trades: 5,
                ..OptimizerConfig::default()
            },
            BacktestConfig::default(),
        );
        let outcome = opt
            .optimize(&prices, StrategyKind::EmaCross, &ema_space(&[2, 3], &[8, 10]))
            .unwrap();
        match outcome {
            OptimizationOutcome::NoValidResults(stats) => {
                assert_eq!(stats.valid, 0);
                assert_eq!(stats.rejected.get(&RejectReason::TooFewTrades), Some(&4));
            }
            other => panic!("expected no valid results, got {other:?}"),
        }
    }

    #[test]
    fn failing_candidate_does_not_abort_sweep() {
        let prices = series_from_closes(&rise_then_fall(120));
        // slow_length 0 fails to build; the rest still run
        let space = ParameterSpace::new(vec![], 100)
            .axis("fast_length", ints(&[3]))
            .axis("slow_length", ints(&[0, 10]))
            .axis("stop_loss_pct", vec![ParamValue::Float(0.0)]);
        let outcome = optimizer(true)
            .optimize(&prices, StrategyKind::EmaCross, &space)
            .unwrap();
        let stats = outcome.stats();
        assert_eq!(stats.rejected.get(&RejectReason::Failed), Some(&1));
        assert!(outcome.best().is_some());
    }

    #[test]
    fn too_large_space_is_fatal() {
        let prices = series_from_closes(&rise_then_fall(50));
        let space = ParameterSpace::new(vec![Constraint::less_than("fast_length", "slow_length")], 3)
            .axis("fast_length", ints(&[2, 3]))
            .axis("slow_length", ints(&[8, 10]));
        assert!(matches!(
            optimizer(true).optimize(&prices, StrategyKind::EmaCross, &space),
            Err(AdaptraderError::ParameterSpaceTooLarge { .. })
        ));
    }

    #[test]
    fn short_series_for_every_candidate_is_fatal() {
        let prices = series_from_closes(&[100.0, 101.0, 102.0]);
        let outcome = optimizer(true).optimize(
            &prices,
            StrategyKind::RegimeEma,
            &ParameterSpace::new(vec![], 10).axis("atr_length", ints(&[14, 15])),
        );
        assert!(matches!(outcome, Err(AdaptraderError::InsufficientData { .. })));
    }

    #[test]
    fn drawdown_filter() {
        let opt = Optimizer::new(
            OptimizerConfig {
                max_drawdown: 0.0,
                ..OptimizerConfig::default()
            },
            BacktestConfig::default(),
        );
        let prices = series_from_closes(&rise_then_fall(120));
        let result = crate::domain::backtest::run(
            &prices,
            StrategyKind::EmaCross,
            &ParameterSet::new().with_int("fast_length", 3).with_int("slow_length", 10),
            &BacktestConfig::default(),
        )
        .unwrap();
        assert!(result.metrics.max_drawdown > 0.0);
        assert_eq!(opt.validate(&result), Err(RejectReason::DrawdownTooDeep));
    }

    #[test]
    fn explicit_thread_pool() {
        let prices = series_from_closes(&rise_then_fall(120));
        let opt = Optimizer::new(
            OptimizerConfig {
                threads: Some(2),
                ..OptimizerConfig::default()
            },
            BacktestConfig::default(),
        );
        let outcome = opt
            .optimize(&prices, StrategyKind::EmaCross, &ema_space(&[3], &[10]))
            .unwrap();
        assert!(outcome.best().is_some());
    }
}
