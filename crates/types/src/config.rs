//! Configuration for every stage of the signal pipeline.
//!
//! Thresholds and multipliers that the strategy depends on (confidence
//! filter, stop/take multipliers, probability bands) are deliberately
//! configuration rather than constants, so they can be tuned per symbol
//! or calibrated from backtest sweeps.

use serde::{Deserialize, Serialize};

// =============================================================================
// Feature engine
// =============================================================================

/// Window sizes for the streaming feature engine.
///
/// The engine becomes ready once `long_window` candles have been seen;
/// every buffer is bounded by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Short SMA/EMA window.
    pub short_window: usize,
    /// Long SMA/EMA window; the largest window and the readiness gate.
    pub long_window: usize,
    /// RSI lookback.
    pub rsi_period: usize,
    /// Bollinger mean/std lookback.
    pub bollinger_window: usize,
    /// Realized-volatility lookback (std dev of returns).
    pub volatility_window: usize,
    /// Funding-rate statistics lookback.
    pub funding_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            short_window: 10,
            long_window: 50,
            rsi_period: 14,
            bollinger_window: 20,
            volatility_window: 20,
            funding_window: 20,
        }
    }
}

impl FeatureConfig {
    /// Candles required before the engine emits vectors.
    #[inline]
    pub fn required_candles(&self) -> usize {
        self.long_window
    }
}

// =============================================================================
// Predictive model
// =============================================================================

/// Adaptive-forest hyperparameters shared by the direction classifier and
/// the return regressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Trees per forest.
    pub n_trees: usize,
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Samples a leaf accumulates between split attempts.
    pub grace_period: u64,
    /// Hoeffding bound confidence parameter (smaller = more conservative).
    pub hoeffding_delta: f64,
    /// Tie-breaking threshold: split anyway once the bound shrinks below this.
    pub tie_threshold: f64,
    /// Trailing window used for per-tree drift error.
    pub drift_window: usize,
    /// Windowed classifier error rate above which a tree is replaced.
    pub drift_error_threshold: f64,
    /// Windowed regressor MAE above this multiple of the forest mean
    /// triggers replacement.
    pub drift_mae_factor: f64,
    /// Samples between drift checks.
    pub drift_check_interval: u64,
    /// Poisson lambda for online bagging weights.
    pub bagging_lambda: f64,
    /// Labeled samples required before non-neutral predictions.
    pub min_samples: u64,
    /// Seed for all forest randomness; fixed seed + fixed stream is
    /// fully deterministic.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_trees: 10,
            max_depth: 8,
            grace_period: 25,
            hoeffding_delta: 1e-3,
            tie_threshold: 0.05,
            drift_window: 50,
            drift_error_threshold: 0.65,
            drift_mae_factor: 2.0,
            drift_check_interval: 20,
            bagging_lambda: 6.0,
            min_samples: 30,
            seed: 42,
        }
    }
}

impl ModelConfig {
    /// Override the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Override the forest size.
    pub fn with_n_trees(mut self, n: usize) -> Self {
        self.n_trees = n;
        self
    }
}

// =============================================================================
// Risk manager
// =============================================================================

/// Position sizing and exit placement parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Stop distance = `stop_vol_mult` x volatility x price.
    pub stop_vol_mult: f64,
    /// Take-profit distance = `take_profit_ratio` x stop distance.
    pub take_profit_ratio: f64,
    /// Fractional-Kelly scaling applied to the raw Kelly stake.
    pub kelly_fraction: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_vol_mult: 2.0,
            take_profit_ratio: 2.5,
            kelly_fraction: 0.5,
        }
    }
}

// =============================================================================
// Strategy engine
// =============================================================================

/// Probability bands and the confidence filter for signal emission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Probability at or above which a buy is strong (mirrored for sells).
    pub strong_threshold: f64,
    /// Probability at or above which a buy is emitted at all (mirrored).
    pub weak_threshold: f64,
    /// Signals require confidence strictly above this bound.
    pub min_confidence: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            strong_threshold: 0.80,
            weak_threshold: 0.55,
            min_confidence: 0.55,
        }
    }
}

impl StrategyConfig {
    /// Override the confidence filter.
    pub fn with_min_confidence(mut self, c: f64) -> Self {
        self.min_confidence = c;
        self
    }
}

// =============================================================================
// Backtester
// =============================================================================

/// Walk-forward backtest parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Candles fed through feature engine + model before any signal is
    /// allowed (avoids trading on an untrained model).
    pub warmup_candles: usize,
    /// Starting balance.
    pub initial_balance: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            warmup_candles: 100,
            initial_balance: 10_000.0,
        }
    }
}

impl BacktestConfig {
    /// Override the warmup length.
    pub fn with_warmup(mut self, candles: usize) -> Self {
        self.warmup_candles = candles;
        self
    }
}
