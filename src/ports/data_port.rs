//! Data access port trait.

use crate::domain::error::AdaptraderError;
use crate::domain::ohlcv::{Interval, PriceSeries};

pub trait DataPort {
    /// All bars for `symbol` at `interval`, oldest first.
    fn fetch_series(&self, symbol: &str, interval: Interval)
    -> Result<PriceSeries, AdaptraderError>;

    /// Symbols available at `interval`.
    fn list_symbols(&self, interval: Interval) -> Result<Vec<String>, AdaptraderError>;
}
