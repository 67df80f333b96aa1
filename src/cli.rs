//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    self, optional_double, optional_int, parse_params, parse_ranges, parse_score_weights,
    strategy_kind, validate_backtest_config, validate_optimize_config,
};
use crate::domain::error::AdaptraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::optimizer::{OptimizationOutcome, Optimizer, OptimizerConfig, SweepStats};
use crate::domain::param_space::{DEFAULT_MAX_COMBINATIONS, DEFAULT_RANGE_PERCENT, ParameterSpace};
use crate::domain::params::ParameterSet;
use crate::domain::strategy::StrategyKind;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "adaptrader",
    about = "Volatility-adaptive strategy backtester and parameter optimizer"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest with the configured parameters
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Grid-search the strategy's parameter space
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the optimization summary as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        /// Worker threads (overrides [optimize] threads)
        #[arg(long)]
        threads: Option<usize>,
        /// Evaluate candidates on the calling thread only
        #[arg(long)]
        sequential: bool,
    },
    /// Validate a configuration file without running anything
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data available for the configured symbol or interval
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// List the available strategies and their default parameters
    ListStrategies,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            symbol,
        } => run_backtest(&config, output.as_ref(), symbol.as_deref()),
        Command::Optimize {
            config,
            output,
            symbol,
            threads,
            sequential,
        } => run_optimize(&config, output.as_ref(), symbol.as_deref(), threads, sequential),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
        Command::ListStrategies => run_list_strategies(),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

fn fail(err: AdaptraderError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

fn data_adapter(config: &dyn ConfigPort) -> CsvAdapter {
    CsvAdapter::new(PathBuf::from(
        config.get_string("data", "path").unwrap_or_else(|| ".".to_string()),
    ))
}

fn run_backtest(
    config_path: &PathBuf,
    output_path: Option<&PathBuf>,
    symbol: Option<&str>,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }

    // Stages 3-7: Data and report port dependent pipeline
    let data_port = data_adapter(&adapter);
    run_backtest_pipeline(&data_port, &JsonReportAdapter::new(), &adapter, symbol, output_path)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, AdaptraderError> {
    Ok(BacktestConfig {
        initial_capital: optional_double(adapter, "backtest", "initial_capital")?
            .unwrap_or(10_000.0),
        execution: ExecutionConfig {
            commission_per_trade: adapter.get_double("backtest", "commission_per_trade", 0.0),
            commission_pct: adapter.get_double("backtest", "commission_pct", 0.0),
        },
        bars_per_year: optional_double(adapter, "data", "bars_per_year")?,
        score_weights: parse_score_weights(adapter)?,
    })
}

pub fn build_optimizer_config(
    adapter: &dyn ConfigPort,
) -> Result<OptimizerConfig, AdaptraderError> {
    let defaults = OptimizerConfig::default();
    Ok(OptimizerConfig {
        min_trades: optional_int(adapter, "optimize", "min_trades")?
            .map_or(defaults.min_trades, |v| v.max(0) as usize),
        max_drawdown: optional_double(adapter, "optimize", "max_drawdown")?
            .unwrap_or(defaults.max_drawdown),
        min_early_return: optional_double(adapter, "optimize", "min_early_return")?,
        top_n: optional_int(adapter, "optimize", "top_n")?
            .map_or(defaults.top_n, |v| v.max(1) as usize),
        parallel: adapter.get_bool("optimize", "parallel", defaults.parallel),
        threads: optional_int(adapter, "optimize", "threads")?.map(|v| v.max(1) as usize),
    })
}

/// Every parameter of `kind` becomes an axis: explicit `[ranges]` entries
/// where given, `[optimize] range_percent` around `base` otherwise.
pub fn build_parameter_space(
    adapter: &dyn ConfigPort,
    kind: StrategyKind,
    base: &ParameterSet,
) -> Result<ParameterSpace, AdaptraderError> {
    let ranges = parse_ranges(adapter, kind)?;
    let range_percent = optional_double(adapter, "optimize", "range_percent")?
        .unwrap_or(DEFAULT_RANGE_PERCENT);
    let max_combinations = optional_int(adapter, "optimize", "max_combinations")?
        .map_or(DEFAULT_MAX_COMBINATIONS, |v| v.max(1) as u64);
    ParameterSpace::for_strategy(kind, base, &ranges, range_percent, max_combinations)
}

/// Fetch the configured series and keep the most recent `[data] candles` bars.
pub fn load_series(
    data_port: &dyn DataPort,
    adapter: &dyn ConfigPort,
    symbol_override: Option<&str>,
) -> Result<PriceSeries, AdaptraderError> {
    let symbol = match symbol_override {
        Some(s) => s.to_uppercase(),
        None => adapter
            .get_string("data", "symbol")
            .map(|s| s.trim().to_uppercase())
            .ok_or_else(|| AdaptraderError::ConfigMissing {
                section: "data".into(),
                key: "symbol".into(),
            })?,
    };
    let interval = config_validation::interval(adapter)?;
    let series = data_port.fetch_series(&symbol, interval)?;
    if series.is_empty() {
        return Err(AdaptraderError::Data {
            reason: format!("no bars for {symbol} at {interval}"),
        });
    }
    Ok(match optional_int(adapter, "data", "candles")? {
        Some(n) if n > 0 => series.tail(n as usize),
        _ => series,
    })
}

fn print_series(series: &PriceSeries) {
    if let (Some(first), Some(last)) = (series.bars.first(), series.bars.last()) {
        eprintln!(
            "Loaded {} {} bars for {}: {} to {}",
            series.len(),
            series.interval,
            series.symbol,
            first.timestamp,
            last.timestamp
        );
    }
}

fn print_metrics(metrics: &Metrics) {
    eprintln!("Final Equity:     ${:.2}", metrics.final_equity);
    eprintln!("Total Return:     {:.2}%", metrics.total_return);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Calmar Ratio:     {:.2}", metrics.calmar_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Avg Bars Held:    {:.1}", metrics.avg_bars_held);
    eprintln!("Score:            {:.2}", metrics.score);
}

fn print_backtest(result: &BacktestResult) {
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Strategy:         {} ({})", result.strategy, result.params);
    eprintln!("First Tradable:   bar {}", result.first_valid_index);
    print_metrics(&result.metrics);
    eprintln!("Buy & Hold:       {:.2}%", result.buy_and_hold_return);
    eprintln!("Early Return:     {:.2}%", result.early_return);

    if !result.trades.is_empty() {
        eprintln!("\n=== Trades ===");
        for t in &result.trades {
            let pnl_sign = if t.pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {} -> {}  {:.2} -> {:.2}  {}${:.2} ({})",
                t.entry_time,
                t.exit_time,
                t.entry_price,
                t.exit_price,
                pnl_sign,
                t.pnl,
                t.exit_reason,
            );
        }
    }
}

fn print_stats(stats: &SweepStats) {
    eprintln!("Combinations:     {}", stats.total_combinations);
    eprintln!("After Filtering:  {}", stats.candidates);
    eprintln!("Valid:            {}", stats.valid);
    for (reason, count) in &stats.rejected {
        eprintln!("  rejected ({reason}): {count}");
    }
}

pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    adapter: &dyn ConfigPort,
    symbol: Option<&str>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 3: Resolve strategy and parameters
    let kind = match strategy_kind(adapter) {
        Ok(k) => k,
        Err(e) => return fail(e),
    };
    let params = match parse_params(adapter, kind) {
        Ok(p) => kind.defaults().merged(&p),
        Err(e) => return fail(e),
    };
    eprintln!("Strategy: {kind} ({params})");

    let bt_config = match build_backtest_config(adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    // Stage 4: Fetch data
    let series = match load_series(data_port, adapter, symbol) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    print_series(&series);

    // Stage 5: Run backtest
    let result = match backtest_engine::run(&series, kind, &params, &bt_config) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    // Stage 6: Print console summary to stderr
    print_backtest(&result);

    // Stage 7: Write report
    if let Some(output) = output_path {
        if let Err(e) = report_port.write_backtest(&result, &output.display().to_string()) {
            return fail(e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }
    ExitCode::SUCCESS
}

fn run_optimize(
    config_path: &PathBuf,
    output_path: Option<&PathBuf>,
    symbol: Option<&str>,
    threads: Option<usize>,
    sequential: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) =
        validate_backtest_config(&adapter).and_then(|_| validate_optimize_config(&adapter))
    {
        return fail(e);
    }

    let mut opt_config = match build_optimizer_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    if threads.is_some() {
        opt_config.threads = threads;
    }
    if sequential {
        opt_config.parallel = false;
    }

    let data_port = data_adapter(&adapter);
    run_optimize_pipeline(
        &data_port,
        &JsonReportAdapter::new(),
        &adapter,
        opt_config,
        symbol,
        output_path,
    )
}

pub fn run_optimize_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    adapter: &dyn ConfigPort,
    opt_config: OptimizerConfig,
    symbol: Option<&str>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: Strategy, base parameters and search space
    let kind = match strategy_kind(adapter) {
        Ok(k) => k,
        Err(e) => return fail(e),
    };
    let base = match parse_params(adapter, kind) {
        Ok(p) => kind.defaults().merged(&p),
        Err(e) => return fail(e),
    };
    let space = match build_parameter_space(adapter, kind, &base) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    eprintln!("Strategy: {kind}");
    for (name, values) in space.axes() {
        let shown: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        eprintln!("  {name}: [{}]", shown.join(", "));
    }
    eprintln!("Search space: {} combinations", space.total_combinations());

    let bt_config = match build_backtest_config(adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    // Stage 2: Fetch data
    let series = match load_series(data_port, adapter, symbol) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    print_series(&series);

    // Stage 3: Sweep
    let optimizer = Optimizer::new(opt_config, bt_config);
    let outcome = match optimizer.optimize(&series, kind, &space) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    // Stage 4: Console summary
    eprintln!("\n=== Optimization Summary ===");
    print_stats(outcome.stats());

    match &outcome {
        OptimizationOutcome::Found(result) => {
            eprintln!("\n=== Leaderboard ===");
            for c in &result.top {
                eprintln!(
                    "  #{:<3} score {:>6.2}  return {:>7.2}%  dd {:>5.1}%  trades {:>3}  {}",
                    c.rank, c.score, c.total_return, c.max_drawdown, c.total_trades, c.params
                );
            }
            print_backtest(&result.best);
        }
        OptimizationOutcome::NoValidResults(_) => {
            eprintln!("\nNo valid results: every candidate was rejected");
        }
    }

    // Stage 5: Write report
    if let Some(output) = output_path {
        if let Err(e) = report_port.write_optimization(&outcome, &output.display().to_string()) {
            return fail(e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_optimize_config(&adapter) {
        return fail(e);
    }

    let kind = match strategy_kind(&adapter) {
        Ok(k) => k,
        Err(e) => return fail(e),
    };
    let base = match parse_params(&adapter, kind) {
        Ok(p) => kind.defaults().merged(&p),
        Err(e) => return fail(e),
    };

    eprintln!("\nStrategy: {kind}");
    eprintln!("Parameters:");
    for (name, value) in base.iter() {
        eprintln!("  {name} = {value}");
    }
    if let Err(e) = kind.build(&base) {
        return fail(e);
    }

    let space = match build_parameter_space(&adapter, kind, &base) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    match space.enumerate() {
        Ok(enumeration) => {
            eprintln!(
                "\nSearch space: {} combinations, {} after constraints",
                enumeration.total_combinations,
                enumeration.valid()
            );
        }
        Err(e) => return fail(e),
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &PathBuf, symbol: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let interval = match config_validation::interval(&config) {
        Ok(i) => i,
        Err(e) => return fail(e),
    };
    let data_port = data_adapter(&config);

    let symbols = match symbol
        .map(str::to_string)
        .or_else(|| config.get_string("data", "symbol"))
    {
        Some(s) => vec![s.trim().to_uppercase()],
        None => match data_port.list_symbols(interval) {
            Ok(s) => s,
            Err(e) => return fail(e),
        },
    };

    if symbols.is_empty() {
        eprintln!("No {interval} data found");
        return ExitCode::SUCCESS;
    }

    for s in &symbols {
        match data_port.fetch_series(s, interval) {
            Ok(series) => match (series.bars.first(), series.bars.last()) {
                (Some(first), Some(last)) => println!(
                    "{}.{}: {} bars, {} to {}",
                    s,
                    interval,
                    series.len(),
                    first.timestamp,
                    last.timestamp
                ),
                _ => eprintln!("{}.{}: no data found", s, interval),
            },
            Err(e) => eprintln!("error reading {}.{}: {}", s, interval, e),
        }
    }
    ExitCode::SUCCESS
}

fn run_list_strategies() -> ExitCode {
    for kind in StrategyKind::ALL {
        println!("{kind}");
        for spec in kind.param_specs() {
            println!("  {} = {}", spec.name, spec.default);
        }
        for c in kind.constraints() {
            println!("  constraint: {c}");
        }
    }
    ExitCode::SUCCESS
}
