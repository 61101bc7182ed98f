//! Command line interface.
//!
//! Each subcommand loads the INI config, builds the data adapter, and runs
//! one operation. Warnings go to stderr so piped stdout stays machine
//! readable.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::config_validation::{
    parse_symbols, risk_free_rate_from, simulation_config_from, symbols_from,
};
use crate::domain::error::QuantfolioError;
use crate::domain::factor::compute_scores;
use crate::domain::metrics::Metrics;
use crate::domain::scheduler::run_simulation;
use crate::domain::selector::select_top_n;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PanelPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser)]
#[command(name = "quantfolio", version, about = "Factor ranking and portfolio backtesting")]
pub struct Cli {
    /// Path to the INI configuration file.
    #[arg(short, long, default_value = "quantfolio.ini", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a backtest over the configured symbols and date range.
    Backtest {
        /// Directory for equity_curve.csv and trades.csv.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated symbol list overriding the configured one.
        #[arg(short, long)]
        symbols: Option<String>,
    },
    /// Print factor scores for the configured symbols as of a date.
    Rank {
        /// Scoring date, YYYY-MM-DD. Defaults to the configured end_date.
        #[arg(short, long)]
        date: Option<String>,
        /// Limit output to the top N symbols by composite score.
        #[arg(short, long)]
        top: Option<usize>,
    },
    /// List every symbol known to the data store.
    ListSymbols,
    /// Show the stored date range and bar count per symbol.
    Info {
        /// Restrict to one symbol; omit to list every stored symbol.
        symbol: Option<String>,
    },
    /// Import <symbol>.csv files from a directory into the database.
    #[cfg(feature = "sqlite")]
    ImportCsv {
        /// Directory of CSV files. Defaults to the configured csv_dir.
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(&err)
        }
    }
}

fn dispatch(cli: Cli) -> Result<(), QuantfolioError> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Backtest { output, symbols } => cmd_backtest(&config, output, symbols),
        Command::Rank { date, top } => cmd_rank(&config, date, top),
        Command::ListSymbols => cmd_list_symbols(&config),
        Command::Info { symbol } => cmd_info(&config, symbol.as_deref()),
        #[cfg(feature = "sqlite")]
        Command::ImportCsv { dir } => cmd_import_csv(&config, dir),
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, QuantfolioError> {
    FileConfigAdapter::from_file(path).map_err(|e| QuantfolioError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(feature = "sqlite")]
fn data_port(config: &dyn ConfigPort) -> Result<Box<dyn PanelPort>, QuantfolioError> {
    if config.get_string("sqlite", "path").is_some() {
        let adapter = SqliteAdapter::from_config(config)?;
        adapter.initialize_schema()?;
        return Ok(Box::new(adapter));
    }
    csv_data_port(config)
}

#[cfg(not(feature = "sqlite"))]
fn data_port(config: &dyn ConfigPort) -> Result<Box<dyn PanelPort>, QuantfolioError> {
    csv_data_port(config)
}

fn csv_data_port(config: &dyn ConfigPort) -> Result<Box<dyn PanelPort>, QuantfolioError> {
    let dir = config
        .get_string("data", "csv_dir")
        .ok_or_else(|| QuantfolioError::ConfigMissing {
            section: "data".to_string(),
            key: "csv_dir".to_string(),
        })?;
    Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
}

fn report_warnings(warnings: &[impl std::fmt::Display]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}

fn cmd_backtest(
    config: &dyn ConfigPort,
    output: Option<PathBuf>,
    symbols_override: Option<String>,
) -> Result<(), QuantfolioError> {
    let sim_config = simulation_config_from(config)?;
    let risk_free_rate = risk_free_rate_from(config)?;
    let symbols = match symbols_override {
        Some(raw) => parse_symbols(&raw)?,
        None => symbols_from(config)?,
    };
    let port = data_port(config)?;

    // Fetch history ahead of the start so the first rebalance has a full
    // factor lookback to score from.
    let lookback = sim_config
        .factors
        .momentum_lookback
        .max(sim_config.factors.volatility_lookback);
    let warmup = Days::new(2 * lookback as u64 + 14);
    let fetch_start = sim_config
        .start_date
        .checked_sub_days(warmup)
        .unwrap_or(sim_config.start_date);

    let panel = port.get_panel(&symbols, fetch_start, sim_config.end_date)?;
    if panel.symbol_count() < symbols.len() {
        eprintln!(
            "warning: price data found for {} of {} symbols",
            panel.symbol_count(),
            symbols.len()
        );
    }

    let result = match run_simulation(&panel, &sim_config) {
        Ok(result) => result,
        Err(failure) => {
            eprintln!(
                "aborted after {} recorded days: {}",
                failure.partial_curve.len(),
                failure
            );
            return Err(failure.cause);
        }
    };

    report_warnings(&result.warnings);

    let metrics = Metrics::compute(&result.equity_curve, result.initial_cash, risk_free_rate);
    let final_nav = result
        .equity_curve
        .final_nav()
        .unwrap_or(result.initial_cash);

    println!("period          {} .. {}", sim_config.start_date, sim_config.end_date);
    println!("initial cash    {:.2}", result.initial_cash);
    println!("final nav       {final_nav:.2}");
    println!("total return    {:.2}%", metrics.total_return * 100.0);
    println!("annualized      {:.2}%", metrics.annualized_return * 100.0);
    println!("max drawdown    {:.2}%", metrics.max_drawdown * 100.0);
    println!("drawdown days   {}", metrics.max_drawdown_duration);
    println!("sharpe ratio    {:.3}", metrics.sharpe_ratio);
    println!("rebalances      {}", result.rebalances.len());
    let total_commission: f64 = result
        .rebalances
        .iter()
        .map(|r| r.outcome.commission_paid)
        .sum();
    println!("commission      {total_commission:.2}");

    if let Some(dir) = output {
        CsvReportAdapter.write(&result, &dir)?;
        println!("reports written to {}", dir.display());
    }

    Ok(())
}

fn cmd_rank(
    config: &dyn ConfigPort,
    date: Option<String>,
    top: Option<usize>,
) -> Result<(), QuantfolioError> {
    let sim_config = simulation_config_from(config)?;
    let symbols = symbols_from(config)?;
    let port = data_port(config)?;

    let as_of = match date {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
            QuantfolioError::ConfigInvalid {
                section: "cli".to_string(),
                key: "date".to_string(),
                reason: format!("{raw}: {e}"),
            }
        })?,
        None => sim_config.end_date,
    };

    let lookback = sim_config
        .factors
        .momentum_lookback
        .max(sim_config.factors.volatility_lookback);
    let fetch_start = as_of
        .checked_sub_days(Days::new(2 * lookback as u64 + 14))
        .unwrap_or(as_of);

    let panel = port.get_panel(&symbols, fetch_start, as_of)?;
    let scores = compute_scores(&panel, as_of, &sim_config.factors);

    if scores.is_empty() {
        println!("no symbol has enough history as of {as_of}");
        return Ok(());
    }

    let mut ranked: Vec<_> = scores.values().collect();
    ranked.sort_by(|a, b| {
        b.composite
            .partial_cmp(&a.composite)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    if let Some(limit) = top {
        ranked.truncate(limit);
    }

    println!("{:<10} {:>12} {:>12} {:>12} {:>10}", "symbol", "momentum", "volatility", "composite", "as of");
    for score in ranked {
        println!(
            "{:<10} {:>12.4} {:>12.4} {:>12.4} {:>10}",
            score.symbol,
            score.momentum,
            score.volatility,
            score.composite,
            score.date.to_string()
        );
    }

    let allocation = select_top_n(&scores, sim_config.top_n);
    if !allocation.is_empty() {
        let picks: Vec<&str> = allocation.symbols().collect();
        println!("top {} selection: {}", allocation.len(), picks.join(", "));
    }

    Ok(())
}

fn cmd_list_symbols(config: &dyn ConfigPort) -> Result<(), QuantfolioError> {
    let port = data_port(config)?;
    let symbols = port.list_symbols()?;
    if symbols.is_empty() {
        println!("no symbols stored");
        return Ok(());
    }
    for symbol in symbols {
        println!("{symbol}");
    }
    Ok(())
}

fn cmd_info(config: &dyn ConfigPort, symbol: Option<&str>) -> Result<(), QuantfolioError> {
    let port = data_port(config)?;
    let symbols = match symbol {
        Some(s) => vec![s.to_string()],
        None => port.list_symbols()?,
    };
    if symbols.is_empty() {
        println!("no symbols stored");
        return Ok(());
    }

    println!("{:<10} {:>12} {:>12} {:>8}", "symbol", "first", "last", "bars");
    for symbol in &symbols {
        match port.get_data_range(symbol)? {
            Some((first, last, count)) => {
                println!(
                    "{symbol:<10} {:>12} {:>12} {count:>8}",
                    first.to_string(),
                    last.to_string()
                );
            }
            None => println!("{symbol:<10} no data stored"),
        }
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
fn cmd_import_csv(
    config: &dyn ConfigPort,
    dir: Option<PathBuf>,
) -> Result<(), QuantfolioError> {
    use crate::adapters::csv_adapter::read_bars;

    let dir = match dir {
        Some(dir) => dir,
        None => config
            .get_string("data", "csv_dir")
            .map(PathBuf::from)
            .ok_or_else(|| QuantfolioError::ConfigMissing {
                section: "data".to_string(),
                key: "csv_dir".to_string(),
            })?,
    };

    let adapter = SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;

    let mut imported = 0usize;
    let mut files = 0usize;
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(symbol) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let bars = read_bars(&path, symbol)?;
        adapter.insert_bars(&bars)?;
        imported += bars.len();
        files += 1;
        println!("{symbol}: {} bars", bars.len());
    }

    println!("imported {imported} bars from {files} files");
    Ok(())
}
