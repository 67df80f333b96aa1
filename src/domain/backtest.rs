//! Backtest engine and event loop.
//!
//! Single-position, long-only simulation. For every bar from the strategy's
//! warmup index to the second-to-last bar: enter if flat and the strategy
//! signals, otherwise evaluate the stop loss and then the strategy exit, then
//! mark equity to market. The last bar is reserved for closing any open
//! position with [`ExitReason::EndOfData`].

use serde::Serialize;
use tracing::debug;

use super::error::AdaptraderError;
use super::execution::ExecutionConfig;
use super::indicator_cache::IndicatorCache;
use super::metrics::{Metrics, ScoreWeights};
use super::ohlcv::{Interval, PriceSeries};
use super::params::ParameterSet;
use super::portfolio::{EquityCurve, Portfolio};
use super::position::{ExitReason, ExitSignal, Position, Trade};
use super::strategy::{BarContext, Strategy, StrategyKind};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
    /// Overrides the interval's default annualisation factor.
    pub bars_per_year: Option<f64>,
    pub score_weights: ScoreWeights,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000.0,
            execution: ExecutionConfig::default(),
            bars_per_year: None,
            score_weights: ScoreWeights::default(),
        }
    }
}

impl BacktestConfig {
    pub fn bars_per_year(&self, interval: Interval) -> f64 {
        self.bars_per_year.unwrap_or_else(|| interval.bars_per_year())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub interval: Interval,
    pub strategy: String,
    pub params: ParameterSet,
    pub initial_capital: f64,
    pub first_valid_index: usize,
    pub trades: Vec<Trade>,
    pub equity_curve: EquityCurve,
    pub metrics: Metrics,
    /// Return (percent) at the midpoint of the tradable window.
    pub early_return: f64,
    /// Close-to-close return (percent) over the tradable window.
    pub buy_and_hold_return: f64,
}

impl BacktestResult {
    pub fn score(&self) -> f64 {
        self.metrics.score
    }

    pub fn final_equity(&self) -> f64 {
        self.metrics.final_equity
    }
}

/// Build `kind` from `params` (strategy defaults fill any gaps), compute its
/// indicators into a private cache and run it over `prices`.
pub fn run(
    prices: &PriceSeries,
    kind: StrategyKind,
    params: &ParameterSet,
    config: &BacktestConfig,
) -> Result<BacktestResult, AdaptraderError> {
    let params = kind.defaults().merged(params);
    let strategy = kind.build(&params)?;
    let mut cache = IndicatorCache::new();
    strategy.compute_indicators(prices, &mut cache);
    run_with_cache(prices, strategy.as_ref(), &params, &cache, config)
}

/// Run `strategy` against indicators already present in `cache`. The cache
/// is only read, so many runs can share one.
pub fn run_with_cache(
    prices: &PriceSeries,
    strategy: &dyn Strategy,
    params: &ParameterSet,
    cache: &IndicatorCache,
    config: &BacktestConfig,
) -> Result<BacktestResult, AdaptraderError> {
    let keys = strategy.indicator_keys();
    let view = cache.view(&keys)?;
    let bars = &prices.bars;
    let len = bars.len();

    let first_valid = strategy.minimum_warmup(&view);
    if len < 2 || first_valid >= len - 1 {
        return Err(AdaptraderError::InsufficientData {
            bars: len,
            minimum: first_valid + 2,
        });
    }

    let stop_loss = strategy.stop_loss();
    let last = len - 1;
    let midpoint = first_valid + (last - first_valid) / 2;
    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut early_return = 0.0;

    for i in first_valid..last {
        let bar = &bars[i];
        let ctx = BarContext {
            index: i,
            bars,
            indicators: &view,
        };

        if portfolio.has_position() {
            let exit = portfolio.position.as_mut().and_then(|pos| {
                stop_loss
                    .and_then(|stop| stop.check(pos, bar))
                    .or_else(|| strategy.exit_signal(&ctx, pos))
            });
            if let Some(ExitSignal { reason, price }) = exit {
                portfolio.close(i, bar.timestamp, price, reason, &config.execution);
            }
        } else if let Some(context) = strategy.entry_signal(&ctx) {
            let shares = portfolio.equity() / bar.close;
            portfolio.open(Position::open(i, bar.timestamp, bar.close, shares, context));
        }

        portfolio.record_equity(i, bar.timestamp, bar.close);
        if i == midpoint {
            early_return = pct_change(config.initial_capital, portfolio.mark_to_market(bar.close));
        }
    }

    let final_bar = &bars[last];
    portfolio.close(
        last,
        final_bar.timestamp,
        final_bar.close,
        ExitReason::EndOfData,
        &config.execution,
    );
    portfolio.record_equity(last, final_bar.timestamp, final_bar.close);

    let metrics = Metrics::compute(
        &portfolio,
        config.bars_per_year(prices.interval),
        &config.score_weights,
    );
    debug!(
        strategy = strategy.name(),
        trades = portfolio.closed_trades.len(),
        score = metrics.score,
        "backtest complete"
    );

    Ok(BacktestResult {
        symbol: prices.symbol.clone(),
        interval: prices.interval,
        strategy: strategy.name().to_string(),
        params: params.clone(),
        initial_capital: config.initial_capital,
        first_valid_index: first_valid,
        buy_and_hold_return: pct_change(bars[first_valid].close, final_bar.close),
        trades: portfolio.closed_trades,
        equity_curve: portfolio.equity_curve,
        metrics,
        early_return,
    })
}

fn pct_change(from: f64, to: f64) -> f64 {
    if from != 0.0 {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}
