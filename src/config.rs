//! CLI-level configuration for the backtest harness.

use backtest::SyntheticConfig;
use clap::ValueEnum;
use strategy::EngineConfig;
use types::{BacktestConfig, ModelConfig};

/// Synthetic market regime to generate when no data file is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegimePreset {
    /// Mild upward drift, moderate noise.
    Trending,
    /// No drift, moderate noise.
    Sideways,
    /// No drift, heavy noise.
    Volatile,
}

impl RegimePreset {
    pub fn stream(self) -> SyntheticConfig {
        match self {
            RegimePreset::Trending => SyntheticConfig::trending(),
            RegimePreset::Sideways => SyntheticConfig::sideways(),
            RegimePreset::Volatile => SyntheticConfig::volatile(),
        }
    }
}

/// Pipeline configuration with the given ensemble seed.
pub fn engine_config(seed: u64) -> EngineConfig {
    EngineConfig {
        model: ModelConfig::default().with_seed(seed),
        ..EngineConfig::default()
    }
}

/// Backtest parameters from CLI arguments.
pub fn backtest_config(warmup: usize, balance: f64) -> BacktestConfig {
    BacktestConfig {
        warmup_candles: warmup,
        initial_balance: balance,
    }
}
