//! Configuration validation.
//!
//! Validates all config fields before a backtest or optimization runs, and
//! parses the open-ended `[params]`, `[ranges]` and `[score]` sections.

use std::collections::BTreeMap;

use crate::domain::error::AdaptraderError;
use crate::domain::metrics::ScoreWeights;
use crate::domain::ohlcv::Interval;
use crate::domain::param_space::ParamRange;
use crate::domain::params::{ParamValue, ParameterSet};
use crate::domain::strategy::StrategyKind;
use crate::ports::config_port::ConfigPort;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    validate_data_source(config)?;
    validate_interval(config)?;
    validate_candles(config)?;
    validate_bars_per_year(config)?;
    validate_initial_capital(config)?;
    validate_commission(config)?;
    let kind = strategy_kind(config)?;
    parse_params(config, kind)?;
    Ok(())
}

pub fn validate_optimize_config(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    validate_range_percent(config)?;
    validate_max_combinations(config)?;
    validate_min_trades(config)?;
    validate_max_drawdown(config)?;
    optional_double(config, "optimize", "min_early_return")?;
    validate_top_n(config)?;
    validate_threads(config)?;
    let kind = strategy_kind(config)?;
    parse_ranges(config, kind)?;
    parse_score_weights(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> AdaptraderError {
    AdaptraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> AdaptraderError {
    AdaptraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

/// A present value must be a finite number; absence is `None`.
pub fn optional_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, AdaptraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, format!("'{}' is not a number", s.trim()))),
        },
    }
}

pub fn optional_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, AdaptraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{}' is not an integer", s.trim()))),
    }
}

fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, AdaptraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(missing(section, key)),
    }
}

fn validate_data_source(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    required_string(config, "data", "path")?;
    required_string(config, "data", "symbol")?;
    Ok(())
}

/// `[data] interval`, defaulting to hourly bars.
pub fn interval(config: &dyn ConfigPort) -> Result<Interval, AdaptraderError> {
    match config.get_string("data", "interval") {
        None => Ok(Interval::OneHour),
        Some(s) => s.parse().map_err(|reason: String| invalid("data", "interval", reason)),
    }
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    interval(config).map(|_| ())
}

fn validate_candles(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    if let Some(n) = optional_int(config, "data", "candles")? {
        if n < 2 {
            return Err(invalid("data", "candles", "candles must be at least 2"));
        }
    }
    Ok(())
}

fn validate_bars_per_year(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    if let Some(v) = optional_double(config, "data", "bars_per_year")? {
        if v <= 0.0 {
            return Err(invalid("data", "bars_per_year", "bars_per_year must be positive"));
        }
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    if let Some(value) = optional_double(config, "backtest", "initial_capital")? {
        if value <= 0.0 {
            return Err(invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    for key in ["commission_per_trade", "commission_pct"] {
        if let Some(value) = optional_double(config, "backtest", key)? {
            if value < 0.0 {
                return Err(invalid("backtest", key, format!("{key} must be non-negative")));
            }
        }
    }
    Ok(())
}

/// The strategy named by `[backtest] strategy`.
pub fn strategy_kind(config: &dyn ConfigPort) -> Result<StrategyKind, AdaptraderError> {
    let name = required_string(config, "backtest", "strategy")?;
    name.parse().map_err(|_| {
        let known: Vec<&str> = StrategyKind::ALL.iter().map(|k| k.name()).collect();
        invalid(
            "backtest",
            "strategy",
            format!("unknown strategy '{name}' (expected one of {})", known.join(", ")),
        )
    })
}

/// `[params]` overrides for `kind`, typed after each parameter's declared
/// default and checked against its bounds.
pub fn parse_params(
    config: &dyn ConfigPort,
    kind: StrategyKind,
) -> Result<ParameterSet, AdaptraderError> {
    let mut params = ParameterSet::new();
    for (name, raw) in config.get_section("params") {
        let spec = kind
            .spec(&name)
            .ok_or_else(|| invalid("params", &name, format!("{kind} has no parameter '{name}'")))?;
        let parsed = ParamValue::parse(&raw).map_err(|reason| invalid("params", &name, reason))?;
        let value = match (spec.default, parsed) {
            (ParamValue::Int(_), ParamValue::Float(v)) => {
                return Err(invalid(
                    "params",
                    &name,
                    format!("{name} must be an integer, got {v}"),
                ));
            }
            (ParamValue::Float(_), ParamValue::Int(v)) => ParamValue::Float(v as f64),
            (_, v) => v,
        };
        let x = value.as_f64();
        if !x.is_finite() || x < spec.min || x > spec.max {
            return Err(invalid(
                "params",
                &name,
                format!("{name} = {value} is outside [{}, {}]", spec.min, spec.max),
            ));
        }
        params.insert(&name, value);
    }
    Ok(params)
}

/// `[ranges]` entries for `kind`. Each must name a declared parameter and
/// expand to at least one value.
pub fn parse_ranges(
    config: &dyn ConfigPort,
    kind: StrategyKind,
) -> Result<BTreeMap<String, ParamRange>, AdaptraderError> {
    let mut ranges = BTreeMap::new();
    for (name, raw) in config.get_section("ranges") {
        let spec = kind
            .spec(&name)
            .ok_or_else(|| invalid("ranges", &name, format!("{kind} has no parameter '{name}'")))?;
        let range = raw.parse::<ParamRange>().map_err(|reason| invalid("ranges", &name, reason))?;
        let values = range
            .values(spec.default, Some(spec))
            .map_err(|e| invalid("ranges", &name, e.to_string()))?;
        if values.is_empty() {
            return Err(invalid("ranges", &name, format!("'{raw}' yields no values")));
        }
        ranges.insert(name, range);
    }
    Ok(ranges)
}

/// `[score]` weight overrides on top of the defaults.
pub fn parse_score_weights(config: &dyn ConfigPort) -> Result<ScoreWeights, AdaptraderError> {
    let mut weights = ScoreWeights::default();
    for (key, _) in config.get_section("score") {
        let value = optional_double(config, "score", &key)?.unwrap_or(0.0);
        if value < 0.0 {
            return Err(invalid("score", &key, format!("{key} weight must be non-negative")));
        }
        match key.as_str() {
            "return" | "total_return" => weights.total_return = value,
            "sharpe" => weights.sharpe = value,
            "calmar" => weights.calmar = value,
            "profit_factor" => weights.profit_factor = value,
            "win_rate" => weights.win_rate = value,
            _ => return Err(invalid("score", &key, format!("unknown score component '{key}'"))),
        }
    }
    if weights.sum() <= 0.0 {
        return Err(invalid("score", "weights", "at least one weight must be positive"));
    }
    Ok(weights)
}

fn validate_range_percent(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    if let Some(value) = optional_double(config, "optimize", "range_percent")? {
        if value < 0.0 {
            return Err(invalid(
                "optimize",
                "range_percent",
                "range_percent must be non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_max_combinations(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    if let Some(value) = optional_int(config, "optimize", "max_combinations")? {
        if value < 1 {
            return Err(invalid(
                "optimize",
                "max_combinations",
                "max_combinations must be at least 1",
            ));
        }
    }
    Ok(())
}

fn validate_min_trades(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    if let Some(value) = optional_int(config, "optimize", "min_trades")? {
        if value < 0 {
            return Err(invalid("optimize", "min_trades", "min_trades must be non-negative"));
        }
    }
    Ok(())
}

fn validate_max_drawdown(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    if let Some(value) = optional_double(config, "optimize", "max_drawdown")? {
        if value <= 0.0 || value > 100.0 {
            return Err(invalid(
                "optimize",
                "max_drawdown",
                "max_drawdown must be between 0 and 100",
            ));
        }
    }
    Ok(())
}

fn validate_top_n(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    if let Some(value) = optional_int(config, "optimize", "top_n")? {
        if value < 1 {
            return Err(invalid("optimize", "top_n", "top_n must be at least 1"));
        }
    }
    Ok(())
}

fn validate_threads(config: &dyn ConfigPort) -> Result<(), AdaptraderError> {
    if let Some(value) = optional_int(config, "optimize", "threads")? {
        if value < 1 {
            return Err(invalid("optimize", "threads", "threads must be at least 1"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const BASE: &str = "[data]\npath = data\nsymbol = QQQ\ninterval = 1h\n\n[backtest]\nstrategy = regime_ema\n";

    fn with_base(extra: &str) -> FileConfigAdapter {
        make_config(&format!("{BASE}{extra}"))
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[data]
path = ./data
symbol = QQQ
interval = 1h
candles = 5000

[backtest]
initial_capital = 10000.0
commission_per_trade = 1.0
commission_pct = 0.05
strategy = kama_adx

[params]
kama_length = 12
adx_threshold = 25
atr_multiplier = 2.5
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn missing_symbol_fails() {
        let config = make_config("[data]\npath = data\n\n[backtest]\nstrategy = rsi\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigMissing { key, .. } if key == "symbol"));
    }

    #[test]
    fn missing_path_fails() {
        let config = make_config("[data]\nsymbol = QQQ\n\n[backtest]\nstrategy = rsi\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigMissing { key, .. } if key == "path"));
    }

    #[test]
    fn unknown_interval_fails() {
        let config = make_config("[data]\npath = d\nsymbol = QQQ\ninterval = 5m\n\n[backtest]\nstrategy = rsi\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "interval"));
    }

    #[test]
    fn interval_defaults_to_hourly() {
        let config = make_config("[data]\npath = d\n");
        assert_eq!(interval(&config).unwrap(), Interval::OneHour);
    }

    #[test]
    fn candles_below_two_fails() {
        let config = make_config(&BASE.replace("interval = 1h", "interval = 1h\ncandles = 1"));
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "candles"));
    }

    #[test]
    fn bars_per_year_zero_fails() {
        let config = make_config(&BASE.replace("interval = 1h", "interval = 1h\nbars_per_year = 0"));
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "bars_per_year")
        );
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config(&BASE.replace("strategy = regime_ema", "strategy = regime_ema\ninitial_capital = 0"));
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "initial_capital")
        );
    }

    #[test]
    fn non_numeric_initial_capital_fails() {
        let config = make_config(&BASE.replace("strategy = regime_ema", "strategy = regime_ema\ninitial_capital = lots"));
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, AdaptraderError::ConfigInvalid { key, reason, .. } if key == "initial_capital" && reason.contains("not a number"))
        );
    }

    #[test]
    fn commission_negative_fails() {
        let config = make_config(&BASE.replace("strategy = regime_ema", "strategy = regime_ema\ncommission_pct = -0.1"));
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "commission_pct")
        );
    }

    #[test]
    fn missing_strategy_fails() {
        let config = make_config("[data]\npath = d\nsymbol = QQQ\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigMissing { key, .. } if key == "strategy"));
    }

    #[test]
    fn unknown_strategy_fails() {
        let config = make_config("[data]\npath = d\nsymbol = QQQ\n\n[backtest]\nstrategy = martingale\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, AdaptraderError::ConfigInvalid { key, reason, .. } if key == "strategy" && reason.contains("regime_ema"))
        );
    }

    #[test]
    fn params_typed_after_declaration() {
        let config = with_base("\n[params]\nfast_length_low = 10\nlow_vol_percentile = 30\nstop_loss_pct = 2\n");
        let params = parse_params(&config, StrategyKind::RegimeEma).unwrap();
        assert_eq!(params.get("fast_length_low"), Some(ParamValue::Int(10)));
        assert_eq!(params.get("stop_loss_pct"), Some(ParamValue::Float(2.0)));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn unknown_param_fails() {
        let config = with_base("\n[params]\nkama_length = 10\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigInvalid { section, key, .. } if section == "params" && key == "kama_length"));
    }

    #[test]
    fn fractional_period_fails() {
        let config = with_base("\n[params]\natr_length = 14.5\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "atr_length"));
    }

    #[test]
    fn out_of_bounds_param_fails() {
        let config = with_base("\n[params]\nhigh_vol_percentile = 120\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "high_vol_percentile")
        );
    }

    #[test]
    fn valid_optimize_config_passes() {
        let config = with_base(
            r#"
[optimize]
range_percent = 0.1
max_combinations = 50000
min_trades = 3
max_drawdown = 40
min_early_return = -5
top_n = 5
threads = 4

[ranges]
fast_length_low = 10..14
slow_length_low = 60,70,80
atr_length = 10%

[score]
return = 0.5
sharpe = 0.5
calmar = 0
profit_factor = 0
win_rate = 0
"#,
        );
        assert!(validate_optimize_config(&config).is_ok());
    }

    #[test]
    fn empty_optimize_section_uses_defaults() {
        assert!(validate_optimize_config(&make_config(BASE)).is_ok());
    }

    #[test]
    fn max_drawdown_out_of_range_fails() {
        let config = with_base("\n[optimize]\nmax_drawdown = 150\n");
        let err = validate_optimize_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "max_drawdown"));
    }

    #[test]
    fn max_combinations_zero_fails() {
        let config = with_base("\n[optimize]\nmax_combinations = 0\n");
        let err = validate_optimize_config(&config).unwrap_err();
        assert!(
            matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "max_combinations")
        );
    }

    #[test]
    fn top_n_zero_fails() {
        let config = with_base("\n[optimize]\ntop_n = 0\n");
        let err = validate_optimize_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "top_n"));
    }

    #[test]
    fn threads_zero_fails() {
        let config = with_base("\n[optimize]\nthreads = 0\n");
        let err = validate_optimize_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "threads"));
    }

    #[test]
    fn negative_range_percent_fails() {
        let config = with_base("\n[optimize]\nrange_percent = -0.1\n");
        let err = validate_optimize_config(&config).unwrap_err();
        assert!(
            matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "range_percent")
        );
    }

    #[test]
    fn malformed_range_fails() {
        let config = with_base("\n[ranges]\natr_length = ten..twenty\n");
        let err = validate_optimize_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigInvalid { section, key, .. } if section == "ranges" && key == "atr_length"));
    }

    #[test]
    fn inverted_range_fails() {
        let config = with_base("\n[ranges]\natr_length = 20..10\n");
        let err = validate_optimize_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "atr_length"));
    }

    #[test]
    fn parse_ranges_reads_every_form() {
        let config = with_base("\n[ranges]\nfast_length_low = [12]\nslow_length_low = 60..62\nfast_length_med = [20, 30]\nslow_length_med = 40, 50\natr_length = 5%\nvolatility_length = 0.1\n");
        let ranges = parse_ranges(&config, StrategyKind::RegimeEma).unwrap();
        assert_eq!(ranges["fast_length_low"], ParamRange::List(vec![ParamValue::Int(12)]));
        assert_eq!(ranges["slow_length_low"], ParamRange::Range { min: 60, max: 62 });
        assert_eq!(ranges["fast_length_med"], ParamRange::Range { min: 20, max: 30 });
        assert_eq!(
            ranges["slow_length_med"],
            ParamRange::List(vec![ParamValue::Int(40), ParamValue::Int(50)])
        );
        assert_eq!(ranges["atr_length"], ParamRange::Percent(0.05));
        assert_eq!(ranges["volatility_length"], ParamRange::Percent(0.1));
    }

    #[test]
    fn score_weights_override_defaults() {
        let config = with_base("\n[score]\nsharpe = 0.6\n");
        let weights = parse_score_weights(&config).unwrap();
        assert!((weights.sharpe - 0.6).abs() < 1e-12);
        assert!((weights.total_return - 0.35).abs() < 1e-12);
    }

    #[test]
    fn unknown_score_component_fails() {
        let config = with_base("\n[score]\nsortino = 0.2\n");
        let err = validate_optimize_config(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigInvalid { key, .. } if key == "sortino"));
    }

    #[test]
    fn all_zero_weights_fail() {
        let config = with_base(
            "\n[score]\nreturn = 0\nsharpe = 0\ncalmar = 0\nprofit_factor = 0\nwin_rate = 0\n",
        );
        let err = parse_score_weights(&config).unwrap_err();
        assert!(matches!(err, AdaptraderError::ConfigInvalid { section, .. } if section == "score"));
    }
}
