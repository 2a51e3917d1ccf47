//! Online feature normalization.
//!
//! Welford-style running mean/variance per feature, fitted one sample
//! at a time. `transform` always uses the statistics accumulated so
//! far, never a batch pass, so normalization can never leak future
//! information into a prediction.

use serde::{Deserialize, Serialize};
use types::FeatureVec;

/// Variance floor preventing division blow-ups on constant features.
const VAR_FLOOR: f64 = 1e-9;

/// Per-feature running mean/variance (Welford's algorithm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineNormalizer {
    count: u64,
    mean: Vec<f64>,
    /// Sum of squared deviations (M2 in Welford's formulation).
    m2: Vec<f64>,
}

impl OnlineNormalizer {
    /// Create a normalizer for `n_features`-wide vectors.
    pub fn new(n_features: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; n_features],
            m2: vec![0.0; n_features],
        }
    }

    /// Samples fitted so far.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Incorporate one raw sample into the running statistics.
    pub fn fit(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.mean.len());
        self.count += 1;
        let n = self.count as f64;
        for (i, &x) in values.iter().enumerate() {
            let delta = x - self.mean[i];
            self.mean[i] += delta / n;
            self.m2[i] += delta * (x - self.mean[i]);
        }
    }

    /// Standardize a sample with the current statistics.
    ///
    /// Before two samples have been fitted there is no variance
    /// estimate; values pass through unscaled.
    pub fn transform(&self, values: &[f64]) -> FeatureVec {
        if self.count < 2 {
            return values.iter().copied().collect();
        }
        let n = self.count as f64;
        values
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let var = (self.m2[i] / n).max(VAR_FLOOR);
                (x - self.mean[i]) / var.sqrt()
            })
            .collect()
    }
}
