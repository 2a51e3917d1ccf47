//! Model output and trade signal types.

use crate::{Symbol, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Direction / Strength
// =============================================================================

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Five-level ordinal signal strength derived from direction probability.
///
/// Ordering is meaningful: `StrongSell < Sell < Neutral < Buy < StrongBuy`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum SignalStrength {
    StrongSell,
    Sell,
    #[default]
    Neutral,
    Buy,
    StrongBuy,
}

impl SignalStrength {
    /// Trade side implied by the strength, `None` for neutral.
    pub fn side(&self) -> Option<Side> {
        match self {
            SignalStrength::StrongBuy | SignalStrength::Buy => Some(Side::Long),
            SignalStrength::StrongSell | SignalStrength::Sell => Some(Side::Short),
            SignalStrength::Neutral => None,
        }
    }

    /// True for StrongBuy/StrongSell.
    pub fn is_strong(&self) -> bool {
        matches!(self, SignalStrength::StrongBuy | SignalStrength::StrongSell)
    }
}

impl fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalStrength::StrongSell => "STRONG_SELL",
            SignalStrength::Sell => "SELL",
            SignalStrength::Neutral => "NEUTRAL",
            SignalStrength::Buy => "BUY",
            SignalStrength::StrongBuy => "STRONG_BUY",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Model output
// =============================================================================

/// Running model health metrics, tracked prequentially (scored before
/// training on every sample) over all time and a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelMetrics {
    /// Labeled samples consumed so far.
    pub samples_seen: u64,
    /// All-time direction accuracy.
    pub accuracy: f64,
    /// Direction accuracy over the trailing window (last 100 samples).
    pub recent_accuracy: f64,
    /// All-time mean absolute error of the return regressor.
    pub mae: f64,
    /// Trailing-window MAE.
    pub recent_mae: f64,
}

/// Output of one model prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    /// Probability the next-horizon move is up, in [0, 1].
    pub direction_probability: f64,
    /// Expected next-horizon fractional return.
    pub expected_return: f64,
    /// Fraction of ensemble trees agreeing with the majority direction.
    pub agreement: f64,
    /// Combined confidence: ensemble agreement blended with the
    /// probability's distance from 0.5. In [0, 1].
    pub confidence: f64,
    /// Metrics snapshot at prediction time.
    pub metrics: ModelMetrics,
}

impl PredictionOutput {
    /// Neutral output used before the model has seen enough samples.
    pub fn neutral(metrics: ModelMetrics) -> Self {
        Self {
            direction_probability: 0.5,
            expected_return: 0.0,
            agreement: 0.0,
            confidence: 0.0,
            metrics,
        }
    }

    /// True when the prediction carries no directional information.
    pub fn is_neutral(&self) -> bool {
        self.confidence == 0.0
    }
}

// =============================================================================
// Trade signal
// =============================================================================

/// A risk-bounded trade recommendation emitted by the strategy engine.
///
/// Immutable once created; consumed by an external execution layer in live
/// operation and by the backtester for PnL simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: Symbol,
    /// Timestamp of the candle that produced the signal.
    pub timestamp: Timestamp,
    pub strength: SignalStrength,
    pub side: Side,
    /// Suggested entry price (close of the signal candle).
    pub suggested_entry: f64,
    /// Position size in base units, already capped by risk limits.
    pub suggested_size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Combined model confidence that cleared the signal filter.
    pub confidence: f64,
    /// Reward distance over risk distance.
    pub risk_reward_ratio: f64,
    /// Human-readable explanation citing the dominant feature signals.
    pub reasoning: String,
    /// Model health at signal time.
    pub model_metrics: ModelMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_ordering() {
        assert!(SignalStrength::StrongSell < SignalStrength::Sell);
        assert!(SignalStrength::Sell < SignalStrength::Neutral);
        assert!(SignalStrength::Neutral < SignalStrength::Buy);
        assert!(SignalStrength::Buy < SignalStrength::StrongBuy);
    }

    #[test]
    fn test_strength_side() {
        assert_eq!(SignalStrength::StrongBuy.side(), Some(Side::Long));
        assert_eq!(SignalStrength::Sell.side(), Some(Side::Short));
        assert_eq!(SignalStrength::Neutral.side(), None);
        assert!(SignalStrength::StrongSell.is_strong());
        assert!(!SignalStrength::Buy.is_strong());
    }

    #[test]
    fn test_neutral_prediction() {
        let p = PredictionOutput::neutral(ModelMetrics::default());
        assert!(p.is_neutral());
        assert_eq!(p.direction_probability, 0.5);
        assert_eq!(p.expected_return, 0.0);
    }
}
