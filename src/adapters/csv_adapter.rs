//! CSV file data adapter.
//!
//! One file per symbol and interval, named `{SYMBOL}_{interval}.csv`, with a
//! header row naming `timestamp, open, high, low, close, volume` (any order,
//! case-insensitive; `date` or `datetime` are accepted for the timestamp).

use crate::domain::error::AdaptraderError;
use crate::domain::ohlcv::{Interval, OhlcvBar, PriceSeries};
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, AdaptraderError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
        };
        let require = |names: &[&str]| {
            find(names).ok_or_else(|| AdaptraderError::Data {
                reason: format!("missing {} column", names[0]),
            })
        };
        Ok(Columns {
            timestamp: require(&["timestamp", "datetime", "date"])?,
            open: require(&["open"])?,
            high: require(&["high"])?,
            low: require(&["low"])?,
            close: require(&["close"])?,
            volume: find(&["volume"]),
        })
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, AdaptraderError> {
    let value = value.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(ts);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%:z"] {
        if let Ok(ts) = DateTime::parse_from_str(value, fmt) {
            return Ok(ts.naive_local());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| AdaptraderError::Data {
            reason: format!("invalid timestamp '{value}'"),
        })
}

fn parse_field(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, AdaptraderError> {
    record
        .get(idx)
        .ok_or_else(|| AdaptraderError::Data {
            reason: format!("missing {name} value"),
        })?
        .trim()
        .parse()
        .map_err(|e| AdaptraderError::Data {
            reason: format!("invalid {name} value: {e}"),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_series(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<PriceSeries, AdaptraderError> {
        let path = self.csv_path(symbol, interval);
        let content = fs::read_to_string(&path).map_err(|e| AdaptraderError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| AdaptraderError::Data {
            reason: format!("CSV header error: {e}"),
        })?;
        let cols = Columns::from_headers(headers)?;
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| AdaptraderError::Data {
                reason: format!("CSV parse error: {e}"),
            })?;

            let ts_str = record.get(cols.timestamp).ok_or_else(|| AdaptraderError::Data {
                reason: "missing timestamp value".into(),
            })?;

            bars.push(OhlcvBar {
                timestamp: parse_timestamp(ts_str)?,
                open: parse_field(&record, cols.open, "open")?,
                high: parse_field(&record, cols.high, "high")?,
                low: parse_field(&record, cols.low, "low")?,
                close: parse_field(&record, cols.close, "close")?,
                volume: match cols.volume {
                    Some(idx) => parse_field(&record, idx, "volume")?,
                    None => 0.0,
                },
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Ok(PriceSeries::new(symbol, interval, bars))
    }

    fn list_symbols(&self, interval: Interval) -> Result<Vec<String>, AdaptraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| AdaptraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", interval);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| AdaptraderError::Data {
                reason: format!("directory entry error: {e}"),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(&suffix) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
