#![allow(dead_code)]

use adaptrader::domain::backtest::BacktestResult;
use adaptrader::domain::error::AdaptraderError;
pub use adaptrader::domain::ohlcv::{Interval, OhlcvBar, PriceSeries};
use adaptrader::domain::optimizer::OptimizationOutcome;
use adaptrader::ports::data_port::DataPort;
use adaptrader::ports::report_port::ReportPort;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::cell::RefCell;
use std::collections::HashMap;
use std::process::ExitCode;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<PriceSeries, AdaptraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(AdaptraderError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(symbol).cloned().unwrap_or_default();
        Ok(PriceSeries::new(symbol, interval, bars))
    }

    fn list_symbols(&self, _interval: Interval) -> Result<Vec<String>, AdaptraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

#[derive(Default)]
pub struct MockReportPort {
    pub backtests: RefCell<Vec<(BacktestResult, String)>>,
    pub optimizations: RefCell<Vec<(OptimizationOutcome, String)>>,
}

impl ReportPort for MockReportPort {
    fn write_backtest(
        &self,
        result: &BacktestResult,
        output_path: &str,
    ) -> Result<(), AdaptraderError> {
        self.backtests
            .borrow_mut()
            .push((result.clone(), output_path.to_string()));
        Ok(())
    }

    fn write_optimization(
        &self,
        outcome: &OptimizationOutcome,
        output_path: &str,
    ) -> Result<(), AdaptraderError> {
        self.optimizations
            .borrow_mut()
            .push((outcome.clone(), output_path.to_string()));
        Ok(())
    }
}

/// Hourly timestamps from 2024-01-02 00:00.
pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::hours(i as i64)
}

/// Bar `i` with a one-point range around `close`.
pub fn make_bar(i: usize, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: ts(i),
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 1000.0,
    }
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i, c))
        .collect()
}

pub fn series(symbol: &str, closes: &[f64]) -> PriceSeries {
    PriceSeries::new(symbol, Interval::OneHour, bars_from_closes(closes))
}

/// Rises one point per bar for the first half, then falls one point per bar.
pub fn rising_then_falling(n: usize) -> Vec<f64> {
    let half = n / 2;
    (0..n)
        .map(|i| {
            if i < half {
                100.0 + i as f64
            } else {
                100.0 + half as f64 - (i - half) as f64 - 1.0
            }
        })
        .collect()
}

/// Deterministic oscillating trend with alternating calm and turbulent
/// stretches, long enough for every strategy's warmup.
pub fn choppy_trend(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            let amplitude = if (i / 60) % 2 == 0 { 2.0 } else { 8.0 };
            200.0 + 0.05 * t + amplitude * (t / 7.0).sin() + 3.0 * (t / 31.0).cos()
        })
        .collect()
}

pub fn exit_code_eq(code: ExitCode, expected: u8) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::from(expected))
}
