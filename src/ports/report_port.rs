//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::AdaptraderError;
use crate::domain::optimizer::OptimizationOutcome;

/// Port for writing backtest and optimization results.
pub trait ReportPort {
    fn write_backtest(
        &self,
        result: &BacktestResult,
        output_path: &str,
    ) -> Result<(), AdaptraderError>;

    fn write_optimization(
        &self,
        outcome: &OptimizationOutcome,
        output_path: &str,
    ) -> Result<(), AdaptraderError>;
}
