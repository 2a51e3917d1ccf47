//! Feature vector and labeled sample types.
//!
//! The feature engine produces one [`FeatureVector`] per candle once its
//! windows are warm. The vector is fixed-width: every feature has a fixed
//! position given by [`FEATURE_NAMES`], and models index positionally.
//!
//! A [`LabeledSample`] pairs a feature vector with the outcome realized one
//! horizon later. It is created only in hindsight and consumed exactly once
//! by the model's update step.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Inline feature storage; [`N_FEATURES`] fits without heap allocation.
pub type FeatureVec = SmallVec<[f64; 16]>;

/// Feature names in extraction order. Models and reasoning strings rely on
/// these positions; append-only if the set ever grows.
pub const FEATURE_NAMES: [&str; 11] = [
    "sma_ratio",
    "ema_ratio",
    "trend",
    "momentum_5",
    "momentum_10",
    "rsi",
    "bollinger_z",
    "volatility",
    "volume_ratio",
    "funding_mean",
    "funding_std",
];

/// Number of features per vector.
pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// A fixed-width feature vector computed from one candle.
///
/// `close` and `timestamp` are carried as provenance for labeling and
/// causality checks; models consume only `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Timestamp of the candle this vector was derived from.
    pub timestamp: Timestamp,
    /// Close of that candle (used to label the next-horizon outcome).
    pub close: f64,
    /// Feature values in [`FEATURE_NAMES`] order.
    pub values: FeatureVec,
}

impl FeatureVector {
    /// Look up a feature by name. Positional access via `values` is the
    /// hot path; this is for reasoning strings and diagnostics.
    pub fn feature(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .and_then(|i| self.values.get(i).copied())
    }

    /// True when every value is finite (no NaN/inf leaked through).
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

/// Supervised training unit created one horizon after its feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    /// Features observed at decision time.
    pub features: FeatureVector,
    /// Realized direction over the next horizon: +1 up, -1 down/flat.
    pub realized_direction: i8,
    /// Realized fractional return over the next horizon.
    pub realized_return: f64,
}

impl LabeledSample {
    /// Label a feature vector with a realized return.
    pub fn from_return(features: FeatureVector, realized_return: f64) -> Self {
        Self {
            features,
            realized_direction: if realized_return > 0.0 { 1 } else { -1 },
            realized_return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn vector() -> FeatureVector {
        let mut values: FeatureVec = smallvec![0.0; N_FEATURES];
        values[5] = 62.5; // rsi
        FeatureVector {
            timestamp: 1_000,
            close: 100.0,
            values,
        }
    }

    #[test]
    fn test_feature_lookup_by_name() {
        let v = vector();
        assert_eq!(v.feature("rsi"), Some(62.5));
        assert_eq!(v.feature("sma_ratio"), Some(0.0));
        assert_eq!(v.feature("nope"), None);
    }

    #[test]
    fn test_labeling_direction() {
        let up = LabeledSample::from_return(vector(), 0.01);
        assert_eq!(up.realized_direction, 1);

        let down = LabeledSample::from_return(vector(), -0.02);
        assert_eq!(down.realized_direction, -1);

        // Flat counts as down: there is nothing to capture going long.
        let flat = LabeledSample::from_return(vector(), 0.0);
        assert_eq!(flat.realized_direction, -1);
    }

    #[test]
    fn test_finite_check() {
        let mut v = vector();
        assert!(v.is_finite());
        v.values[0] = f64::NAN;
        assert!(!v.is_finite());
    }
}
