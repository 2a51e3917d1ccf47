//! Per-symbol signal pipeline.
//!
//! `on_candle` runs the full chain: feature update, labeling the
//! previous candle's features with the return just realized, model
//! update, prediction, probability-to-strength mapping, confidence
//! filter, risk sizing, signal assembly. The labeling step runs before
//! prediction, so the model is always scored and trained on strictly
//! past information.

use std::collections::HashMap;

use features::{FeatureEngine, FeatureError};
use model::PredictiveModel;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::{
    AccountState, Candle, FeatureConfig, FeatureVector, LabeledSample, ModelConfig, ModelMetrics,
    PredictionOutput, RiskConfig, SignalStrength, StrategyConfig, Symbol, TradeSignal, N_FEATURES,
};

use crate::risk::RiskManager;

/// Errors surfaced by the signal pipeline.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Feature(#[from] FeatureError),
}

pub type Result<T> = std::result::Result<T, StrategyError>;

/// Configuration for every stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    pub features: FeatureConfig,
    pub model: ModelConfig,
    pub risk: RiskConfig,
    pub strategy: StrategyConfig,
}

/// Everything learned about one symbol. Checkpointable as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SymbolState {
    pub(crate) features: FeatureEngine,
    pub(crate) model: PredictiveModel,
    /// Feature vector awaiting its next-candle label.
    pub(crate) pending: Option<FeatureVector>,
    /// Features at the last emitted signal, for trade-outcome feedback.
    pub(crate) signal_features: Option<FeatureVector>,
}

impl SymbolState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            features: FeatureEngine::new(config.features),
            model: PredictiveModel::new(N_FEATURES, &config.model),
            pending: None,
            signal_features: None,
        }
    }
}

/// The live orchestration point: candles in, risk-bounded signals out.
///
/// Symbols are fully independent; each owns its own feature engine and
/// model, so a portfolio can be sharded across workers with one engine
/// per shard.
#[derive(Debug)]
pub struct StrategyEngine {
    config: EngineConfig,
    risk: RiskManager,
    symbols: HashMap<Symbol, SymbolState>,
}

impl StrategyEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            risk: RiskManager::new(config.risk),
            symbols: HashMap::new(),
        }
    }

    /// Symbols with any accumulated state.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    /// Model health for a symbol, if it has been seen.
    pub fn model_metrics(&self, symbol: &str) -> Option<ModelMetrics> {
        self.symbols.get(symbol).map(|s| s.model.metrics())
    }

    /// Feed one candle without emitting a signal (warm start).
    ///
    /// Runs the identical feature/label/train path as [`on_candle`](Self::on_candle),
    /// so a warm-started model is indistinguishable from one that lived
    /// through the same candles in replay.
    pub fn observe(&mut self, symbol: &str, candle: &Candle) -> Result<()> {
        self.advance(symbol, candle)?;
        Ok(())
    }

    /// Full pipeline for one candle; `None` when no qualifying signal.
    pub fn on_candle(
        &mut self,
        symbol: &str,
        candle: &Candle,
        account: &AccountState,
    ) -> Result<Option<TradeSignal>> {
        let Some(vector) = self.advance(symbol, candle)? else {
            return Ok(None);
        };
        let Some(state) = self.symbols.get_mut(symbol) else {
            return Ok(None);
        };
        let prediction = state.model.predict(&vector);

        let strength = strength_for(prediction.direction_probability, &self.config.strategy);
        let Some(side) = strength.side() else {
            return Ok(None);
        };
        if !clears_confidence_filter(prediction.confidence, &self.config.strategy) {
            return Ok(None);
        }

        let volatility = vector.feature("volatility").unwrap_or(0.0);
        let sizing = self
            .risk
            .size_position(account, candle.close, volatility, prediction.confidence);
        if sizing.size <= 0.0 {
            tracing::debug!(symbol, volatility, "signal suppressed by zero risk sizing");
            return Ok(None);
        }

        let reasoning = reasoning(&vector, &prediction, strength);
        state.signal_features = Some(vector.clone());

        let signal = TradeSignal {
            symbol: symbol.to_string(),
            timestamp: candle.timestamp,
            strength,
            side,
            suggested_entry: candle.close,
            suggested_size: sizing.size,
            stop_loss: sizing.stop_price(candle.close, side),
            take_profit: sizing.take_price(candle.close, side),
            confidence: prediction.confidence,
            risk_reward_ratio: sizing.risk_reward,
            reasoning,
            model_metrics: prediction.metrics,
        };
        tracing::info!(
            symbol,
            timestamp = candle.timestamp,
            strength = %strength,
            size = signal.suggested_size,
            confidence = signal.confidence,
            "signal emitted"
        );
        Ok(Some(signal))
    }

    /// Feed the realized return of a closed trade back into the model,
    /// labeled with the features that produced the entry signal.
    ///
    /// Each signal's features are consumed at most once; a second close
    /// report for the same signal is a no-op.
    pub fn update_with_trade_outcome(&mut self, symbol: &str, realized_return: f64) {
        let Some(state) = self.symbols.get_mut(symbol) else {
            return;
        };
        if let Some(vector) = state.signal_features.take() {
            tracing::debug!(symbol, realized_return, "trade outcome fed back to model");
            state
                .model
                .update(&LabeledSample::from_return(vector, realized_return));
        }
    }

    /// Shared feature/label/train step. Returns the new feature vector
    /// once the engine is warm.
    fn advance(&mut self, symbol: &str, candle: &Candle) -> Result<Option<FeatureVector>> {
        let config = self.config;
        let state = self
            .symbols
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolState::new(&config));

        // Validation happens inside the feature engine; a rejected
        // candle leaves the pending label untouched.
        let update = state.features.update(candle)?;

        if let Some(prev) = state.pending.take() {
            let realized = candle.close / prev.close - 1.0;
            state
                .model
                .update(&LabeledSample::from_return(prev, realized));
        }

        match update.ready() {
            Some(vector) => {
                state.pending = Some(vector.clone());
                Ok(Some(vector))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn symbol_state(&self, symbol: &str) -> Option<&SymbolState> {
        self.symbols.get(symbol)
    }

    pub(crate) fn insert_symbol_state(&mut self, symbol: &str, state: SymbolState) {
        self.symbols.insert(symbol.to_string(), state);
    }
}

/// Map an up-probability onto the five-level strength scale.
fn strength_for(prob: f64, config: &StrategyConfig) -> SignalStrength {
    if prob >= config.strong_threshold {
        SignalStrength::StrongBuy
    } else if prob >= config.weak_threshold {
        SignalStrength::Buy
    } else if prob <= 1.0 - config.strong_threshold {
        SignalStrength::StrongSell
    } else if prob <= 1.0 - config.weak_threshold {
        SignalStrength::Sell
    } else {
        SignalStrength::Neutral
    }
}

/// Exclusive lower bound: confidence exactly at the filter is rejected.
fn clears_confidence_filter(confidence: f64, config: &StrategyConfig) -> bool {
    confidence > config.min_confidence
}

/// Human-readable explanation citing the dominant feature signals.
fn reasoning(
    vector: &FeatureVector,
    prediction: &PredictionOutput,
    strength: SignalStrength,
) -> String {
    let trend = vector.feature("trend").unwrap_or(0.0);
    let momentum = vector.feature("momentum_5").unwrap_or(0.0);
    let rsi = vector.feature("rsi").unwrap_or(50.0);
    format!(
        "{strength}: p(up)={:.2} agreement={:.0}% | trend={:+.4} momentum5={:+.2}% rsi={:.0} | \
         recent accuracy {:.0}% over {} samples",
        prediction.direction_probability,
        prediction.agreement * 100.0,
        trend,
        momentum * 100.0,
        rsi,
        prediction.metrics.recent_accuracy * 100.0,
        prediction.metrics.samples_seen,
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_config() -> EngineConfig {
        EngineConfig {
            features: FeatureConfig {
                short_window: 3,
                long_window: 10,
                rsi_period: 3,
                bollinger_window: 5,
                volatility_window: 5,
                funding_window: 5,
            },
            model: ModelConfig {
                n_trees: 3,
                grace_period: 10,
                min_samples: 10,
                ..ModelConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    fn candle(symbol: &str, i: u64, close: f64) -> Candle {
        Candle::new(
            symbol,
            (i + 1) * 60_000,
            close,
            close * 1.001,
            close * 0.999,
            close,
            100.0,
        )
    }

    #[test]
    fn test_no_signal_before_warmup() {
        let mut engine = StrategyEngine::new(test_config());
        let account = AccountState::default();
        for i in 0..9 {
            let signal = engine
                .on_candle("BTC", &candle("BTC", i, 100.0 + i as f64), &account)
                .unwrap();
            assert!(signal.is_none(), "signal before feature warmup");
        }
    }

    #[test]
    fn test_flat_stream_emits_nothing() {
        let mut engine = StrategyEngine::new(test_config());
        let account = AccountState::default();
        for i in 0..60 {
            let c = Candle::new("BTC", (i + 1) * 60_000, 100.0, 100.0, 100.0, 100.0, 100.0);
            assert!(engine.on_candle("BTC", &c, &account).unwrap().is_none());
        }
    }

    #[test]
    fn test_observe_trains_the_model() {
        let mut engine = StrategyEngine::new(test_config());
        for i in 0..40 {
            let close = 100.0 * (1.0 + 0.003 * (i as f64 % 7.0 - 3.0));
            engine.observe("ETH", &candle("ETH", i, close)).unwrap();
        }
        let metrics = engine.model_metrics("ETH").unwrap();
        // Ready from candle 10 on; each later candle labels its
        // predecessor, and the last vector is still pending.
        assert_eq!(metrics.samples_seen, 30);
    }

    #[test]
    fn test_out_of_order_candle_is_rejected_not_fatal() {
        let mut engine = StrategyEngine::new(test_config());
        let account = AccountState::default();
        for i in 0..20 {
            engine
                .on_candle("BTC", &candle("BTC", i, 100.0), &account)
                .unwrap();
        }
        let stale = candle("BTC", 5, 100.0);
        assert!(engine.on_candle("BTC", &stale, &account).is_err());
        // Stream continues normally afterwards.
        assert!(engine
            .on_candle("BTC", &candle("BTC", 20, 100.0), &account)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_outcome_feedback_without_signal_is_noop() {
        let mut engine = StrategyEngine::new(test_config());
        for i in 0..30 {
            engine.observe("BTC", &candle("BTC", i, 100.0)).unwrap();
        }
        let before = engine.model_metrics("BTC").unwrap().samples_seen;
        engine.update_with_trade_outcome("BTC", 0.05);
        engine.update_with_trade_outcome("UNSEEN", 0.05);
        assert_eq!(engine.model_metrics("BTC").unwrap().samples_seen, before);
    }

    #[test]
    fn test_confidence_boundary_is_exclusive() {
        let cfg = StrategyConfig::default();
        assert!(!clears_confidence_filter(0.55, &cfg));
        assert!(!clears_confidence_filter(0.54, &cfg));
        assert!(clears_confidence_filter(0.550_000_1, &cfg));
    }

    #[test]
    fn test_strength_thresholds() {
        let cfg = StrategyConfig::default();
        assert_eq!(strength_for(0.85, &cfg), SignalStrength::StrongBuy);
        assert_eq!(strength_for(0.80, &cfg), SignalStrength::StrongBuy);
        assert_eq!(strength_for(0.79, &cfg), SignalStrength::Buy);
        assert_eq!(strength_for(0.55, &cfg), SignalStrength::Buy);
        assert_eq!(strength_for(0.50, &cfg), SignalStrength::Neutral);
        assert_eq!(strength_for(0.46, &cfg), SignalStrength::Neutral);
        assert_eq!(strength_for(0.45, &cfg), SignalStrength::Sell);
        assert_eq!(strength_for(0.20, &cfg), SignalStrength::StrongSell);
        assert_eq!(strength_for(0.15, &cfg), SignalStrength::StrongSell);
    }
}
