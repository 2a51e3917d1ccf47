//! The public model facade.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::{FeatureVector, LabeledSample, ModelConfig, ModelMetrics, PredictionOutput};

use crate::forest::{AdaptiveForest, AdaptiveForestRegressor};
use crate::metrics::PrequentialMetrics;
use crate::normalizer::OnlineNormalizer;

/// Errors surfaced by model persistence.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model state serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("model state is corrupt or from an incompatible version: {0}")]
    Deserialize(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Online dual-estimator model: a direction classifier and a return
/// regressor over one normalized feature stream.
///
/// `update` is strictly test-then-train: the incoming sample is scored
/// against the model state before that sample influences anything
/// (normalizer included), so `metrics` always reports out-of-sample
/// performance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveModel {
    direction: AdaptiveForest,
    returns: AdaptiveForestRegressor,
    normalizer: OnlineNormalizer,
    metrics: PrequentialMetrics,
    min_samples: u64,
}

impl PredictiveModel {
    pub fn new(n_features: usize, config: &ModelConfig) -> Self {
        Self {
            direction: AdaptiveForest::new(n_features, config),
            returns: AdaptiveForestRegressor::new(n_features, config),
            normalizer: OnlineNormalizer::new(n_features),
            metrics: PrequentialMetrics::new(),
            min_samples: config.min_samples,
        }
    }

    /// Labeled samples consumed so far.
    pub fn samples_seen(&self) -> u64 {
        self.metrics.samples_seen()
    }

    /// Current prequential metrics.
    pub fn metrics(&self) -> ModelMetrics {
        self.metrics.snapshot()
    }

    /// Trees replaced by drift detection, both ensembles combined.
    pub fn drift_replacements(&self) -> u64 {
        self.direction.n_replacements() + self.returns.n_replacements()
    }

    /// Predict direction and return for one feature vector.
    ///
    /// Neutral until `min_samples` labeled samples have been absorbed;
    /// an untrained forest's vote is noise, not signal.
    pub fn predict(&self, features: &FeatureVector) -> PredictionOutput {
        if self.samples_seen() < self.min_samples {
            return PredictionOutput::neutral(self.metrics.snapshot());
        }
        let z = self.normalizer.transform(&features.values);
        let (prob, agreement) = self.direction.predict(&z);
        let expected_return = self.returns.predict(&z);
        PredictionOutput {
            direction_probability: prob,
            expected_return,
            agreement,
            confidence: blend_confidence(prob, agreement),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Absorb one labeled sample.
    ///
    /// Ordering inside this method is the whole integrity story:
    /// 1. normalize with the statistics accumulated before this sample,
    /// 2. score the pre-update forests against the label,
    /// 3. train the forests,
    /// 4. fold the raw values into the normalizer.
    pub fn update(&mut self, sample: &LabeledSample) {
        let z = self.normalizer.transform(&sample.features.values);

        let (prob, _) = self.direction.predict(&z);
        let predicted_up = prob > 0.5;
        let realized_up = sample.realized_direction > 0;
        let abs_error = (self.returns.predict(&z) - sample.realized_return).abs();
        self.metrics.record(predicted_up == realized_up, abs_error);

        let class = usize::from(realized_up);
        self.direction.learn(&z, class);
        self.returns.learn(&z, sample.realized_return);

        self.normalizer.fit(&sample.features.values);
    }

    /// Serialize the full model state to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ModelError::Serialize)
    }

    /// Restore a model from [`to_json`](Self::to_json) output.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(ModelError::Deserialize)
    }
}

/// Blend ensemble agreement with the probability's distance from 0.5.
fn blend_confidence(prob: f64, agreement: f64) -> f64 {
    let decisiveness = 2.0 * (prob - 0.5).abs();
    (0.5 * agreement + 0.5 * decisiveness).clamp(0.0, 1.0)
}
