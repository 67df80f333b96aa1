//! Memoized indicator series for one price series.
//!
//! An optimization run fills the cache once (in parallel) before the sweep,
//! then shares it read-only across every candidate. A standalone backtest
//! builds a private cache on the fly.

use crate::domain::error::AdaptraderError;
use crate::domain::indicator::{IndicatorKey, IndicatorSeries};
use crate::domain::ohlcv::PriceSeries;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct IndicatorCache {
    series: HashMap<IndicatorKey, IndicatorSeries>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute `key` over `prices` unless already cached.
    pub fn ensure(&mut self, prices: &PriceSeries, key: IndicatorKey) -> &IndicatorSeries {
        self.series
            .entry(key)
            .or_insert_with(|| key.compute(prices))
    }

    /// Compute every missing key in parallel. Returns how many were computed.
    pub fn prefill<I>(&mut self, prices: &PriceSeries, keys: I) -> usize
    where
        I: IntoIterator<Item = IndicatorKey>,
    {
        let missing: Vec<IndicatorKey> = keys
            .into_iter()
            .filter(|k| !self.series.contains_key(k))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let computed: Vec<(IndicatorKey, IndicatorSeries)> = missing
            .par_iter()
            .map(|&key| (key, key.compute(prices)))
            .collect();

        let count = computed.len();
        self.series.extend(computed);
        count
    }

    pub fn get(&self, key: &IndicatorKey) -> Option<&IndicatorSeries> {
        self.series.get(key)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Resolve `keys` into a slot-ordered view. Fails if any key is missing.
    pub fn view(&self, keys: &[IndicatorKey]) -> Result<IndicatorView<'_>, AdaptraderError> {
        let slots = keys
            .iter()
            .map(|key| {
                self.series
                    .get(key)
                    .ok_or_else(|| AdaptraderError::InvalidParameterSet {
                        reason: format!("indicator {key} was not computed"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IndicatorView { slots })
    }
}

/// Indicator series a strategy reads, in the order it declared them.
#[derive(Debug, Clone)]
pub struct IndicatorView<'a> {
    slots: Vec<&'a IndicatorSeries>,
}

impl<'a> IndicatorView<'a> {
    pub fn new(slots: Vec<&'a IndicatorSeries>) -> Self {
        Self { slots }
    }

    /// Value of slot `slot` at bar `i`.
    pub fn at(&self, slot: usize, i: usize) -> Option<f64> {
        self.slots.get(slot).and_then(|s| s.get(i)).filter(|v| v.is_finite())
    }

    /// (previous, current) values of slot `slot` at bar `i`.
    pub fn pair(&self, slot: usize, i: usize) -> Option<(f64, f64)> {
        let prev = self.at(slot, i.checked_sub(1)?)?;
        Some((prev, self.at(slot, i)?))
    }

    /// First bar at which every slot has a value.
    pub fn first_valid(&self) -> usize {
        self.slots.iter().map(|s| s.offset).max().unwrap_or(0)
    }

    /// One past the last bar at which every slot has a value.
    pub fn end(&self) -> usize {
        self.slots.iter().map(|s| s.end()).min().unwrap_or(0)
    }
}
