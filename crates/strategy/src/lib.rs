//! Signal generation: risk sizing, the per-symbol strategy pipeline,
//! and checkpoint persistence.
//!
//! [`StrategyEngine`] is the orchestration point for live use: feed it
//! candles, get back risk-bounded [`types::TradeSignal`]s. Sizing rules
//! live in [`RiskManager`], a pure function of account limits and
//! market state, so they can be tested and tuned in isolation.

pub mod checkpoint;
pub mod engine;
pub mod risk;

pub use checkpoint::CheckpointError;
pub use engine::{EngineConfig, StrategyEngine, StrategyError};
pub use risk::{PositionSizing, RiskManager};
