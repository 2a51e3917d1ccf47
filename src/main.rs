//! Backtest harness for the online-learning signal core.
//!
//! Generates seeded synthetic candle streams (or one regime preset per
//! symbol), runs the walk-forward backtest for every symbol, prints a
//! summary table, and optionally writes a JSON report and per-symbol
//! checkpoints for a later warm start.

mod config;

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use backtest::{generate, run_portfolio, BacktestReport, Backtester};
use clap::Parser;
use strategy::EngineConfig;
use tracing_subscriber::EnvFilter;
use types::Symbol;

use config::RegimePreset;

/// Online-learning trade-signal backtester for perpetual futures.
#[derive(Parser, Debug)]
#[command(name = "perp-signals")]
#[command(about = "Walk-forward backtests over an online-learning signal pipeline")]
#[command(version)]
struct Args {
    /// Comma-separated symbols, one independent stream each
    #[arg(long, env = "SIGNALS_SYMBOLS", default_value = "BTC-PERP", value_delimiter = ',')]
    symbols: Vec<String>,

    /// Candles to generate per symbol (warmup included)
    #[arg(long, env = "SIGNALS_CANDLES", default_value_t = 2_000)]
    candles: usize,

    /// Candles fed through the model before any signal is allowed
    #[arg(long, env = "SIGNALS_WARMUP", default_value_t = 100)]
    warmup: usize,

    /// Initial account balance in quote currency
    #[arg(long, env = "SIGNALS_BALANCE", default_value_t = 10_000.0)]
    balance: f64,

    /// Seed for candle generation and the model ensembles
    #[arg(long, env = "SIGNALS_SEED", default_value_t = 42)]
    seed: u64,

    /// Synthetic market regime
    #[arg(long, env = "SIGNALS_PRESET", value_enum, default_value_t = RegimePreset::Trending)]
    preset: RegimePreset,

    /// Write per-symbol model checkpoints here after the run
    #[arg(long, env = "SIGNALS_CHECKPOINT_DIR")]
    checkpoint_dir: Option<PathBuf>,

    /// Write the full JSON report here
    #[arg(long, env = "SIGNALS_REPORT")]
    report: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let stream_config = args.preset.stream();
    let backtest_config = config::backtest_config(args.warmup, args.balance);

    // Offset the seed per symbol so streams differ while staying
    // reproducible. Both run paths consume the same stream/config
    // pairs, so adding --checkpoint-dir never changes the results.
    let streams: Vec<(Symbol, EngineConfig, Vec<types::Candle>)> = args
        .symbols
        .iter()
        .enumerate()
        .map(|(i, symbol)| {
            let seed = args.seed.wrapping_add(i as u64);
            (
                symbol.clone(),
                config::engine_config(seed),
                generate(symbol, args.candles, &stream_config, seed),
            )
        })
        .collect();

    let mut reports: Vec<(Symbol, BacktestReport)> = Vec::with_capacity(args.symbols.len());
    if let Some(dir) = &args.checkpoint_dir {
        // Sequential path: each engine is kept to write its checkpoint.
        for (symbol, engine_config, candles) in &streams {
            let mut backtester = Backtester::new(*engine_config, backtest_config);
            let report = backtester.run(symbol, candles)?;
            backtester.into_engine().save_checkpoint(symbol, dir)?;
            reports.push((symbol.clone(), report));
        }
    } else {
        for (symbol, result) in run_portfolio(backtest_config, streams) {
            reports.push((symbol, result?));
        }
    }

    print_summary(&reports);

    if let Some(path) = &args.report {
        let reports_only: Vec<&BacktestReport> = reports.iter().map(|(_, r)| r).collect();
        std::fs::write(path, serde_json::to_string_pretty(&reports_only)?)?;
        tracing::info!(path = %path.display(), "report written");
    }
    Ok(())
}

fn print_summary(reports: &[(Symbol, BacktestReport)]) {
    println!(
        "{:<12} {:>7} {:>9} {:>9} {:>9} {:>13}",
        "symbol", "trades", "win rate", "return", "max dd", "final balance"
    );
    for (symbol, report) in reports {
        let s = &report.stats;
        println!(
            "{:<12} {:>7} {:>8.1}% {:>8.2}% {:>8.2}% {:>13.2}",
            symbol,
            s.trade_count,
            s.win_rate * 100.0,
            s.total_return * 100.0,
            s.max_drawdown * 100.0,
            s.final_balance,
        );
    }
}
