//! Volatility regime classification.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    Low,
    Medium,
    High,
}

impl Regime {
    /// value < low → Low; value < high → Medium; else High.
    ///
    /// Does not validate `low < high`; parameter-space constraints reject
    /// such sets before they reach a strategy.
    pub fn classify(value: f64, low: f64, high: f64) -> Regime {
        if value < low {
            Regime::Low
        } else if value < high {
            Regime::Medium
        } else {
            Regime::High
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Regime::Low => "LOW",
            Regime::Medium => "MEDIUM",
            Regime::High => "HIGH",
        };
        f.write_str(s)
    }
}
