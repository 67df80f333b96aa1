//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod indicator_cache;
pub mod regime;
pub mod params;
pub mod param_space;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod optimizer;
pub mod config_validation;
pub mod error;
