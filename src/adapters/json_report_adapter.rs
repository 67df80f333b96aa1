//! JSON report adapter implementing ReportPort.
//!
//! Backtests are written as the serialised [`BacktestResult`]. Optimization
//! runs are written as a summary envelope carrying the sweep statistics,
//! the leaderboard and, when one exists, the full best-candidate backtest.
//! Non-finite floats (an infinite profit factor) serialise as `null`.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::AdaptraderError;
use crate::domain::optimizer::{OptimizationOutcome, RankedCandidate, SweepStats};
use crate::domain::params::ParameterSet;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Found,
    NoValidResults,
}

#[derive(Serialize)]
struct OptimizationReport<'a> {
    status: Status,
    stats: &'a SweepStats,
    best_params: Option<&'a ParameterSet>,
    best_score: Option<f64>,
    top: &'a [RankedCandidate],
    best: Option<&'a BacktestResult>,
}

impl<'a> OptimizationReport<'a> {
    fn from_outcome(outcome: &'a OptimizationOutcome) -> Self {
        match outcome {
            OptimizationOutcome::Found(result) => OptimizationReport {
                status: Status::Found,
                stats: &result.stats,
                best_params: Some(&result.best_params),
                best_score: Some(result.best_score),
                top: &result.top,
                best: Some(&result.best),
            },
            OptimizationOutcome::NoValidResults(stats) => OptimizationReport {
                status: Status::NoValidResults,
                stats,
                best_params: None,
                best_score: None,
                top: &[],
                best: None,
            },
        }
    }
}

impl JsonReportAdapter {
    pub fn new() -> Self {
        JsonReportAdapter
    }

    fn write_json<T: Serialize>(value: &T, output_path: &str) -> Result<(), AdaptraderError> {
        let json = serde_json::to_string_pretty(value).map_err(|e| AdaptraderError::Report {
            reason: format!("failed to serialise report: {e}"),
        })?;
        if let Some(parent) = Path::new(output_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| AdaptraderError::Report {
                    reason: format!("failed to create {}: {e}", parent.display()),
                })?;
            }
        }
        fs::write(output_path, json).map_err(|e| AdaptraderError::Report {
            reason: format!("failed to write {output_path}: {e}"),
        })
    }
}

impl ReportPort for JsonReportAdapter {
    fn write_backtest(
        &self,
        result: &BacktestResult,
        output_path: &str,
    ) -> Result<(), AdaptraderError> {
        Self::write_json(result, output_path)
    }

    fn write_optimization(
        &self,
        outcome: &OptimizationOutcome,
        output_path: &str,
    ) -> Result<(), AdaptraderError> {
        Self::write_json(&OptimizationReport::from_outcome(outcome), output_path)
    }
}
