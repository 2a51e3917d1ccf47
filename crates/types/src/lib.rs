//! Shared data model for the perp-signals workspace.
//!
//! This crate defines the types that flow between the streaming feature
//! engine, the online predictive model, the risk/strategy layer, and the
//! walk-forward backtester:
//!
//! - [`Candle`] - OHLCV input with optional funding rate
//! - [`FeatureVector`] / [`FeatureVec`] - fixed-width streaming features
//! - [`LabeledSample`] - hindsight training unit (features + realized outcome)
//! - [`PredictionOutput`] / [`ModelMetrics`] - model output and health
//! - [`TradeSignal`] / [`SignalStrength`] - risk-bounded trade recommendation
//! - [`AccountState`] / [`TradeRecord`] - account limits and realized trades
//! - Configuration structs for every stage of the pipeline
//!
//! # Design Notes
//!
//! - All numeric market data uses `f64`; the pipeline is statistical and
//!   never nets positions against an exchange ledger.
//! - Everything here is plain data: `Serialize`/`Deserialize` throughout so
//!   model checkpoints and backtest reports are one `serde_json` call away.

mod account;
mod candle;
mod config;
mod features;
mod signal;

pub use account::{AccountState, EquityPoint, ExitReason, TradeRecord};
pub use candle::Candle;
pub use config::{BacktestConfig, FeatureConfig, ModelConfig, RiskConfig, StrategyConfig};
pub use features::{FEATURE_NAMES, FeatureVec, FeatureVector, LabeledSample, N_FEATURES};
pub use signal::{ModelMetrics, PredictionOutput, Side, SignalStrength, TradeSignal};

// =============================================================================
// Core aliases
// =============================================================================

/// Instrument symbol (e.g., "BTC-USD").
pub type Symbol = String;

/// Wall clock timestamp in milliseconds since epoch.
pub type Timestamp = u64;
