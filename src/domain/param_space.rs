//! Parameter space generation.
//!
//! Each axis is a parameter name with its candidate values. The space is the
//! cartesian product of all axes, filtered by structural constraints. The
//! raw product size is checked against a ceiling before anything is
//! materialised.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::error::AdaptraderError;
use super::params::{Constraint, ParamSpec, ParamValue, ParameterSet};
use super::strategy::StrategyKind;

pub const DEFAULT_MAX_COMBINATIONS: u64 = 1_000_000;
pub const DEFAULT_RANGE_PERCENT: f64 = 0.05;

/// How one parameter's candidate values are specified.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamRange {
    List(Vec<ParamValue>),
    /// Inclusive integer range.
    Range { min: i64, max: i64 },
    /// ± fraction of the default (0.05 = ±5%).
    Percent(f64),
}

impl ParamRange {
    /// Candidate values for a parameter whose default is `default`, clamped
    /// to `spec` bounds when given.
    pub fn values(
        &self,
        default: ParamValue,
        spec: Option<&ParamSpec>,
    ) -> Result<Vec<ParamValue>, AdaptraderError> {
        let (lo_bound, hi_bound) =
            spec.map_or((f64::NEG_INFINITY, f64::INFINITY), |s| (s.min, s.max));
        match self {
            ParamRange::List(values) => Ok(values.clone()),
            ParamRange::Range { min, max } => {
                if min > max {
                    return Err(AdaptraderError::invalid_params(format!(
                        "range {min}..{max} is empty"
                    )));
                }
                Ok((*min..=*max).map(ParamValue::Int).collect())
            }
            ParamRange::Percent(pct) => {
                if !pct.is_finite() || *pct < 0.0 {
                    return Err(AdaptraderError::invalid_params(format!(
                        "range percent must be non-negative, got {pct}"
                    )));
                }
                Ok(match default {
                    ParamValue::Int(v) => {
                        let v = v as f64;
                        let lo = (v * (1.0 - pct)).trunc().max(lo_bound) as i64;
                        let hi = (v * (1.0 + pct)).trunc().min(hi_bound) as i64;
                        (lo..=hi).map(ParamValue::Int).collect()
                    }
                    ParamValue::Float(v) => {
                        let mut out: Vec<ParamValue> = Vec::with_capacity(3);
                        for x in [v * (1.0 - pct), v, v * (1.0 + pct)] {
                            let x = x.max(lo_bound).min(hi_bound);
                            if !out.iter().any(|p| p.as_f64() == x) {
                                out.push(ParamValue::Float(x));
                            }
                        }
                        out
                    }
                })
            }
        }
    }
}

impl FromStr for ParamRange {
    type Err = String;

    /// `1,2,3`, `[4]` or `[1, 2, 3]` is a list; `[5, 20]` and `5..20` are
    /// inclusive integer ranges; `5%` or a bare `0.05` is a percent.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((min, max)) = s.split_once("..") {
            let min = min.trim().parse::<i64>().map_err(|e| format!("'{s}': {e}"))?;
            let max = max.trim().parse::<i64>().map_err(|e| format!("'{s}': {e}"))?;
            return Ok(ParamRange::Range { min, max });
        }
        let bracketed = s.strip_prefix('[').and_then(|r| r.strip_suffix(']'));
        if bracketed.is_some() || s.contains(',') {
            let body = bracketed.unwrap_or(s);
            let values = body
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ParamValue::parse)
                .collect::<Result<Vec<_>, _>>()?;
            return match (bracketed.is_some(), values.as_slice()) {
                (_, []) => Err(format!("'{s}': empty list")),
                (true, &[ParamValue::Int(min), ParamValue::Int(max)]) => {
                    Ok(ParamRange::Range { min, max })
                }
                _ => Ok(ParamRange::List(values.clone())),
            };
        }
        if let Some(pct) = s.strip_suffix('%') {
            let pct = pct.trim().parse::<f64>().map_err(|e| format!("'{s}': {e}"))?;
            return Ok(ParamRange::Percent(pct / 100.0));
        }
        s.parse::<f64>()
            .map(ParamRange::Percent)
            .map_err(|_| format!("'{s}' is not a list, range or percent"))
    }
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamRange::List(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                match parts.as_slice() {
                    [single] => write!(f, "[{single}]"),
                    _ => f.write_str(&parts.join(", ")),
                }
            }
            ParamRange::Range { min, max } => write!(f, "{min}..{max}"),
            ParamRange::Percent(p) => write!(f, "±{}%", p * 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpace {
    axes: Vec<(String, Vec<ParamValue>)>,
    constraints: Vec<Constraint>,
    max_combinations: u64,
}

/// The materialised space plus its counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Enumeration {
    pub candidates: Vec<ParameterSet>,
    /// Cartesian product size before constraints.
    pub total_combinations: u64,
}

impl Enumeration {
    /// Combinations surviving the constraints.
    pub fn valid(&self) -> usize {
        self.candidates.len()
    }

    pub fn rejected(&self) -> u64 {
        self.total_combinations - self.candidates.len() as u64
    }
}

impl ParameterSpace {
    pub fn new(constraints: Vec<Constraint>, max_combinations: u64) -> Self {
        ParameterSpace {
            axes: Vec::new(),
            constraints,
            max_combinations,
        }
    }

    /// Add or replace an axis.
    pub fn axis(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        match self.axes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.axes.push((name.to_string(), values)),
        }
        self
    }

    /// Space for `kind`: every declared parameter becomes an axis, expanded
    /// from `ranges` or else from `default_percent` around its base value.
    /// Base values come from `base` (usually defaults merged with config
    /// overrides). Ranges naming unknown parameters are rejected.
    pub fn for_strategy(
        kind: StrategyKind,
        base: &ParameterSet,
        ranges: &BTreeMap<String, ParamRange>,
        default_percent: f64,
        max_combinations: u64,
    ) -> Result<Self, AdaptraderError> {
        if let Some(unknown) = ranges.keys().find(|name| kind.spec(name).is_none()) {
            return Err(AdaptraderError::invalid_params(format!(
                "{kind} has no parameter '{unknown}'"
            )));
        }

        let mut space = ParameterSpace::new(kind.constraints(), max_combinations);
        let fallback = ParamRange::Percent(default_percent);
        for spec in kind.param_specs() {
            let default = base.get(spec.name).unwrap_or(spec.default);
            let range = ranges.get(spec.name).unwrap_or(&fallback);
            let values = range.values(default, Some(spec))?;
            space = space.axis(spec.name, values);
        }
        Ok(space)
    }

    pub fn axes(&self) -> &[(String, Vec<ParamValue>)] {
        &self.axes
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Product of the axis sizes; saturates at `u64::MAX`.
    pub fn total_combinations(&self) -> u64 {
        self.axes
            .iter()
            .try_fold(1u64, |acc, (_, values)| acc.checked_mul(values.len() as u64))
            .unwrap_or(u64::MAX)
    }

    /// Cartesian product in axis order (last axis varies fastest), with
    /// constraint violators dropped.
    pub fn enumerate(&self) -> Result<Enumeration, AdaptraderError> {
        let total = self.total_combinations();
        if total > self.max_combinations {
            return Err(AdaptraderError::ParameterSpaceTooLarge {
                combinations: total,
                ceiling: self.max_combinations,
            });
        }

        let mut candidates = Vec::new();
        if total > 0 {
            let mut cursor = vec![0usize; self.axes.len()];
            loop {
                let params: ParameterSet = self
                    .axes
                    .iter()
                    .zip(&cursor)
                    .map(|((name, values), &k)| (name.as_str(), values[k]))
                    .collect();
                if self.constraints.iter().all(|c| c.holds(&params)) {
                    candidates.push(params);
                }
                if !advance(&mut cursor, &self.axes) {
                    break;
                }
            }
        }

        debug!(
            total_combinations = total,
            valid = candidates.len(),
            "parameter space enumerated"
        );
        Ok(Enumeration {
            candidates,
            total_combinations: total,
        })
    }
}

/// Odometer step. Returns false once every combination has been visited.
fn advance(cursor: &mut [usize], axes: &[(String, Vec<ParamValue>)]) -> bool {
    for pos in (0..cursor.len()).rev() {
        cursor[pos] += 1;
        if cursor[pos] < axes[pos].1.len() {
            return true;
        }
        cursor[pos] = 0;
    }
    false
}
