//! Performance metrics and the composite ranking score.

use super::portfolio::{EquityCurve, Portfolio};
use super::position::Trade;
use serde::{Deserialize, Serialize};

/// Summary statistics for one backtest. Percent quantities (`total_return`,
/// `max_drawdown`, `win_rate`) are on a 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub final_equity: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// `+inf` when there are wins and no losses.
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub calmar_ratio: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Mean holding period in bars.
    pub avg_bars_held: f64,
    pub score: f64,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, bars_per_year: f64, weights: &ScoreWeights) -> Self {
        let initial_capital = portfolio.initial_capital;
        let final_equity = portfolio.equity();
        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital * 100.0
        } else {
            0.0
        };

        let max_drawdown = portfolio.equity_curve.max_drawdown;
        let stats = TradeStats::from_trades(&portfolio.closed_trades);
        let sharpe_ratio = sharpe_ratio(&portfolio.equity_curve, bars_per_year);
        let calmar_ratio = calmar_ratio(total_return, max_drawdown);

        let mut metrics = Metrics {
            final_equity,
            total_return,
            max_drawdown,
            total_trades: portfolio.closed_trades.len(),
            winning_trades: stats.won,
            losing_trades: stats.lost,
            win_rate: stats.win_rate(),
            profit_factor: stats.profit_factor(),
            sharpe_ratio,
            calmar_ratio,
            avg_win: stats.avg_win(),
            avg_loss: stats.avg_loss(),
            largest_win: stats.largest_win,
            largest_loss: stats.largest_loss,
            avg_bars_held: stats.avg_bars_held(),
            score: 0.0,
        };
        metrics.score = weights.score(&metrics);
        metrics
    }

    /// Whether any headline figure is NaN or infinite. An infinite profit
    /// factor is a legitimate value and does not count.
    pub fn is_degenerate(&self) -> bool {
        !(self.total_return.is_finite()
            && self.max_drawdown.is_finite()
            && self.sharpe_ratio.is_finite()
            && self.calmar_ratio.is_finite()
            && self.score.is_finite())
            || self.profit_factor.is_nan()
    }
}

#[derive(Debug, Default)]
struct TradeStats {
    won: usize,
    lost: usize,
    gross_win: f64,
    gross_loss: f64,
    largest_win: f64,
    largest_loss: f64,
    bars_held: usize,
    counted: usize,
}

impl TradeStats {
    /// Trades with non-finite P&L are skipped entirely.
    fn from_trades(trades: &[Trade]) -> Self {
        let mut stats = TradeStats::default();
        for trade in trades {
            let pnl = trade.pnl;
            if !pnl.is_finite() {
                continue;
            }
            stats.counted += 1;
            stats.bars_held += trade.exit_index.saturating_sub(trade.entry_index);
            if pnl > 0.0 {
                stats.won += 1;
                stats.gross_win += pnl;
                stats.largest_win = stats.largest_win.max(pnl);
            } else {
                stats.lost += 1;
                stats.gross_loss += pnl.abs();
                stats.largest_loss = stats.largest_loss.max(pnl.abs());
            }
        }
        stats
    }

    fn win_rate(&self) -> f64 {
        let decided = self.won + self.lost;
        if decided > 0 {
            self.won as f64 / decided as f64 * 100.0
        } else {
            0.0
        }
    }

    fn profit_factor(&self) -> f64 {
        if self.gross_loss > 0.0 {
            self.gross_win / self.gross_loss
        } else if self.gross_win > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }

    fn avg_win(&self) -> f64 {
        if self.won > 0 {
            self.gross_win / self.won as f64
        } else {
            0.0
        }
    }

    fn avg_loss(&self) -> f64 {
        if self.lost > 0 {
            self.gross_loss / self.lost as f64
        } else {
            0.0
        }
    }

    fn avg_bars_held(&self) -> f64 {
        if self.counted > 0 {
            self.bars_held as f64 / self.counted as f64
        } else {
            0.0
        }
    }
}

/// Annualized mean/stddev of bar returns (population stddev, no risk-free
/// rate). Zero when the curve is flat or too short.
pub fn sharpe_ratio(curve: &EquityCurve, bars_per_year: f64) -> f64 {
    let returns = curve.returns();
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev > 0.0 {
        mean / stddev * bars_per_year.sqrt()
    } else {
        0.0
    }
}

pub fn calmar_ratio(total_return: f64, max_drawdown: f64) -> f64 {
    if max_drawdown > 0.0 {
        total_return / max_drawdown
    } else {
        0.0
    }
}

/// Weights of the composite score. Each sub-score is scaled to roughly
/// 0–100 and clamped there before weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub total_return: f64,
    pub sharpe: f64,
    pub calmar: f64,
    pub profit_factor: f64,
    pub win_rate: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            total_return: 0.35,
            sharpe: 0.25,
            calmar: 0.20,
            profit_factor: 0.10,
            win_rate: 0.10,
        }
    }
}

const SHARPE_SCALE: f64 = 20.0;
const CALMAR_SCALE: f64 = 10.0;
const PROFIT_FACTOR_SCALE: f64 = 20.0;

impl ScoreWeights {
    pub fn score(&self, m: &Metrics) -> f64 {
        self.total_return * clamp_score(m.total_return)
            + self.sharpe * clamp_score(m.sharpe_ratio * SHARPE_SCALE)
            + self.calmar * clamp_score(m.calmar_ratio * CALMAR_SCALE)
            + self.profit_factor * clamp_score(m.profit_factor * PROFIT_FACTOR_SCALE)
            + self.win_rate * clamp_score(m.win_rate)
    }

    pub fn sum(&self) -> f64 {
        self.total_return + self.sharpe + self.calmar + self.profit_factor + self.win_rate
    }
}

/// Clamp to [0, 100]; NaN scores 0, +inf scores 100.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
