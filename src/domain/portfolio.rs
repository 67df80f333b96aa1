//! Account state and equity tracking for a single-position backtest.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::execution::ExecutionConfig;
use super::position::{ExitReason, Position, Trade};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Mark-to-market equity with running peak and maximum drawdown (percent).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityCurve {
    pub points: Vec<EquityPoint>,
    pub peak: f64,
    pub max_drawdown: f64,
}

impl EquityCurve {
    /// The running peak starts at `initial_capital`.
    pub fn new(initial_capital: f64) -> Self {
        EquityCurve {
            points: Vec::new(),
            peak: initial_capital,
            max_drawdown: 0.0,
        }
    }

    pub fn record(&mut self, index: usize, timestamp: NaiveDateTime, equity: f64) {
        if equity > self.peak {
            self.peak = equity;
        }
        if self.peak > 0.0 {
            let drawdown = (self.peak - equity) / self.peak * 100.0;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
        self.points.push(EquityPoint {
            index,
            timestamp,
            equity,
        });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.points.last().map(|p| p.equity)
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.equity).collect()
    }

    /// Bar-over-bar simple returns.
    pub fn returns(&self) -> Vec<f64> {
        self.points
            .windows(2)
            .map(|w| {
                let prev = w[0].equity;
                if prev > 0.0 {
                    (w[1].equity - prev) / prev
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// Cash account plus at most one open position.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub initial_capital: f64,
    pub realized_pnl: f64,
    pub position: Option<Position>,
    pub closed_trades: Vec<Trade>,
    pub equity_curve: EquityCurve,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            initial_capital,
            realized_pnl: 0.0,
            position: None,
            closed_trades: Vec::new(),
            equity_curve: EquityCurve::new(initial_capital),
        }
    }

    /// Realized equity: initial capital plus closed-trade P&L.
    pub fn equity(&self) -> f64 {
        self.initial_capital + self.realized_pnl
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Equity with any open position valued at `price`.
    pub fn mark_to_market(&self, price: f64) -> f64 {
        match &self.position {
            Some(pos) => self.equity() + pos.unrealized_pnl(price),
            None => self.equity(),
        }
    }

    pub fn open(&mut self, position: Position) {
        self.position = Some(position);
    }

    /// Close the open position, if any, and record the trade.
    pub fn close(
        &mut self,
        exit_index: usize,
        exit_time: NaiveDateTime,
        exit_price: f64,
        reason: ExitReason,
        execution: &ExecutionConfig,
    ) -> Option<&Trade> {
        let pos = self.position.take()?;
        let entry_value = pos.market_value(pos.entry_price);
        let exit_value = pos.market_value(exit_price);
        let commission = execution.round_trip(entry_value, exit_value);
        let pnl = (exit_price - pos.entry_price) * pos.shares - commission;
        let pnl_pct = if entry_value != 0.0 {
            pnl / entry_value * 100.0
        } else {
            0.0
        };

        self.realized_pnl += pnl;
        self.closed_trades.push(Trade {
            entry_index: pos.entry_index,
            exit_index,
            entry_time: pos.entry_time,
            exit_time,
            entry_price: pos.entry_price,
            exit_price,
            shares: pos.shares,
            commission,
            pnl,
            pnl_pct,
            exit_reason: reason,
            context: pos.context,
        });
        self.closed_trades.last()
    }

    pub fn record_equity(&mut self, index: usize, timestamp: NaiveDateTime, price: f64) {
        let equity = self.mark_to_market(price);
        self.equity_curve.record(index, timestamp, equity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::EntryContext;
    use chrono::NaiveDate;

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn new_portfolio() {
        let p = Portfolio::new(10_000.0);
        assert!((p.equity() - 10_000.0).abs() < f64::EPSILON);
        assert!(!p.has_position());
        assert!(p.closed_trades.is_empty());
        assert!(p.equity_curve.is_empty());
    }

    #[test]
    fn mark_to_market_values_open_position() {
        let mut p = Portfolio::new(10_000.0);
        p.open(Position::open(0, ts(0), 100.0, 100.0, EntryContext::default()));
        assert!((p.mark_to_market(110.0) - 11_000.0).abs() < 1e-9);
        assert!((p.mark_to_market(90.0) - 9_000.0).abs() < 1e-9);
    }

    #[test]
    fn close_realizes_pnl_net_of_commission() {
        let mut p = Portfolio::new(10_000.0);
        p.open(Position::open(0, ts(0), 100.0, 100.0, EntryContext::default()));
        let execution = ExecutionConfig {
            commission_per_trade: 5.0,
            commission_pct: 0.0,
        };
        let trade = p
            .close(3, ts(3), 110.0, ExitReason::Signal, &execution)
            .unwrap()
            .clone();
        assert!((trade.pnl - 990.0).abs() < 1e-9);
        assert!((trade.commission - 10.0).abs() < 1e-9);
        assert!((trade.pnl_pct - 9.9).abs() < 1e-9);
        assert!((p.equity() - 10_990.0).abs() < 1e-9);
        assert!(!p.has_position());
    }

    #[test]
    fn close_without_position_is_none() {
        let mut p = Portfolio::new(10_000.0);
        assert!(p
            .close(1, ts(1), 100.0, ExitReason::Signal, &ExecutionConfig::default())
            .is_none());
    }

    #[test]
    fn curve_tracks_peak_and_drawdown() {
        let mut curve = EquityCurve::new(100.0);
        curve.record(0, ts(0), 100.0);
        curve.record(1, ts(1), 120.0);
        curve.record(2, ts(2), 90.0);
        curve.record(3, ts(3), 110.0);
        assert!((curve.peak - 120.0).abs() < f64::EPSILON);
        assert!((curve.max_drawdown - 25.0).abs() < 1e-9);
        assert_eq!(curve.last(), Some(110.0));
    }

    #[test]
    fn curve_returns() {
        let mut curve = EquityCurve::new(100.0);
        curve.record(0, ts(0), 100.0);
        curve.record(1, ts(1), 110.0);
        curve.record(2, ts(2), 99.0);
        let r = curve.returns();
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert!((r[1] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn drawdown_below_initial_capital() {
        let mut curve = EquityCurve::new(100.0);
        curve.record(0, ts(0), 80.0);
        assert!((curve.max_drawdown - 20.0).abs() < 1e-9);
    }
}
