//! Walk-forward backtesting for the signal pipeline.
//!
//! The runner replays candles through the exact live path (feature
//! update, prequential model update, signal generation, risk sizing),
//! simulates fills against candle highs/lows, and reports stats, the
//! trade list, and an equity curve. Synthetic streams make the whole
//! loop reproducible without any market-data dependency.

pub mod runner;
pub mod stats;
pub mod synthetic;

pub use runner::{run_portfolio, BacktestError, BacktestReport, Backtester};
pub use stats::{max_drawdown, BacktestStats};
pub use synthetic::{generate, SyntheticConfig};
