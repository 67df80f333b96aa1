//! Parameter sets, per-strategy parameter declarations and structural constraints.

use crate::domain::error::AdaptraderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Integers are structural (periods, lengths); floats are thresholds and multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParamValue::Int(v) => v as f64,
            ParamValue::Float(v) => v,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, ParamValue::Int(_))
    }

    /// Parse "13" as Int and "2.5" as Float.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Ok(ParamValue::Int(v));
        }
        s.parse::<f64>()
            .map(ParamValue::Float)
            .map_err(|_| format!("'{s}' is not a number"))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Immutable name → value mapping identifying one backtest run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: ParamValue) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn with_int(self, name: &str, value: i64) -> Self {
        self.with(name, ParamValue::Int(value))
    }

    pub fn with_float(self, name: &str, value: f64) -> Self {
        self.with(name, ParamValue::Float(value))
    }

    pub fn insert(&mut self, name: &str, value: ParamValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Values from `overrides` replace values here.
    pub fn merged(&self, overrides: &ParameterSet) -> ParameterSet {
        let mut values = self.values.clone();
        values.extend(overrides.values.iter().map(|(k, v)| (k.clone(), *v)));
        ParameterSet { values }
    }

    /// A period or count: must be an integer >= 1.
    pub fn period(&self, name: &str) -> Result<usize, AdaptraderError> {
        match self.get(name) {
            Some(ParamValue::Int(v)) if v >= 1 => Ok(v as usize),
            Some(ParamValue::Float(v)) if v.fract() == 0.0 && v >= 1.0 => Ok(v as usize),
            Some(other) => Err(AdaptraderError::invalid_params(format!(
                "{name} must be a positive integer, got {other}"
            ))),
            None => Err(missing(name)),
        }
    }

    pub fn number(&self, name: &str) -> Result<f64, AdaptraderError> {
        match self.get(name) {
            Some(v) if v.as_f64().is_finite() => Ok(v.as_f64()),
            Some(other) => Err(AdaptraderError::invalid_params(format!(
                "{name} must be finite, got {other}"
            ))),
            None => Err(missing(name)),
        }
    }
}

fn missing(name: &str) -> AdaptraderError {
    AdaptraderError::invalid_params(format!("missing parameter {name}"))
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&parts.join(", "))
    }
}

impl<S: Into<String>> FromIterator<(S, ParamValue)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (S, ParamValue)>>(iter: T) -> Self {
        ParameterSet {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A parameter a strategy reads: its default and the bounds that percent
/// ranges are clamped to.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: ParamValue,
    pub min: f64,
    pub max: f64,
}

impl ParamSpec {
    pub const fn period(name: &'static str, default: i64) -> Self {
        ParamSpec {
            name,
            default: ParamValue::Int(default),
            min: 1.0,
            max: f64::INFINITY,
        }
    }

    pub const fn percentile(name: &'static str, default: i64) -> Self {
        ParamSpec {
            name,
            default: ParamValue::Int(default),
            min: 0.0,
            max: 100.0,
        }
    }

    pub const fn float(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        ParamSpec {
            name,
            default: ParamValue::Float(default),
            min,
            max,
        }
    }
}

pub fn defaults(specs: &[ParamSpec]) -> ParameterSet {
    specs.iter().map(|s| (s.name, s.default)).collect()
}

/// Structural constraint `lower < upper` between two parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub lower: String,
    pub upper: String,
}

impl Constraint {
    pub fn less_than(lower: &str, upper: &str) -> Self {
        Constraint {
            lower: lower.to_string(),
            upper: upper.to_string(),
        }
    }

    /// Constraints over parameters absent from `params` are vacuously satisfied.
    pub fn holds(&self, params: &ParameterSet) -> bool {
        match (params.get(&self.lower), params.get(&self.upper)) {
            (Some(a), Some(b)) => a.as_f64() < b.as_f64(),
            _ => true,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} < {}", self.lower, self.upper)
    }
}

/// First violated constraint, as an `InvalidParameterSet` error.
pub fn check_constraints(
    params: &ParameterSet,
    constraints: &[Constraint],
) -> Result<(), AdaptraderError> {
    match constraints.iter().find(|c| !c.holds(params)) {
        Some(c) => Err(AdaptraderError::invalid_params(format!(
            "constraint {c} violated by {params}"
        ))),
        None => Ok(()),
    }
}
