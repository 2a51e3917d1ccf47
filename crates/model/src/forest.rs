//! Adaptive forests with online bagging and drift-driven replacement.
//!
//! Each tree sees every sample with a Poisson-drawn weight, so the
//! forest approximates bootstrap bagging without storing data. Every
//! tree also carries a rolling window of its own prequential errors;
//! when a tree's windowed error crosses its threshold it is discarded
//! and reseeded, which is how the ensemble tracks regime changes.
//!
//! No RNG state is carried between updates: every `learn` call derives
//! its randomness from the configured seed and the update counter, so a
//! forest restored from a checkpoint continues bit-identically to one
//! that never stopped.

use features::RollingWindow;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};
use types::ModelConfig;

use crate::reg_tree::RegressionTree;
use crate::tree::HoeffdingTree;

/// Minimum forest-wide MAE before relative drift checks engage.
const MAE_FLOOR: f64 = 1e-12;

/// Seed offset separating the regressor's stream from the classifier's.
const REGRESSOR_TAG: u64 = 0x5265_6752;

fn derive_rng(seed: u64, n_update: u64) -> StdRng {
    // Golden-ratio mix keeps per-update streams distinct.
    StdRng::seed_from_u64(seed.wrapping_add(n_update.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ClassifierSlot {
    tree: HoeffdingTree,
    /// 0/1 prequential errors over the drift window.
    errors: RollingWindow,
}

/// Ensemble of direction-classifier trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveForest {
    slots: Vec<ClassifierSlot>,
    n_features: usize,
    config: ModelConfig,
    n_updates: u64,
    n_replacements: u64,
}

impl AdaptiveForest {
    pub fn new(n_features: usize, config: &ModelConfig) -> Self {
        let mut rng = derive_rng(config.seed, 0);
        let slots = (0..config.n_trees)
            .map(|_| ClassifierSlot {
                tree: HoeffdingTree::new(n_features, config, &mut rng),
                errors: RollingWindow::new(config.drift_window),
            })
            .collect();
        Self {
            slots,
            n_features,
            config: *config,
            n_updates: 0,
            n_replacements: 0,
        }
    }

    /// Samples learned so far.
    pub fn n_updates(&self) -> u64 {
        self.n_updates
    }

    /// Trees replaced by the drift detector so far.
    pub fn n_replacements(&self) -> u64 {
        self.n_replacements
    }

    /// Mean up-probability and the fraction of trees voting with the
    /// majority side. Trees with no lean (exactly 0.5) abstain, so a
    /// fresh forest reports zero agreement.
    pub fn predict(&self, features: &[f64]) -> (f64, f64) {
        let n = self.slots.len();
        if n == 0 {
            return (0.5, 0.0);
        }
        let mut sum = 0.0;
        let mut votes_up = 0usize;
        let mut votes_down = 0usize;
        for slot in &self.slots {
            let p = slot.tree.predict_prob(features);
            sum += p;
            if p > 0.5 {
                votes_up += 1;
            } else if p < 0.5 {
                votes_down += 1;
            }
        }
        let agreement = votes_up.max(votes_down) as f64 / n as f64;
        (sum / n as f64, agreement)
    }

    /// Test-then-train on one labeled sample (class 0 = down, 1 = up).
    ///
    /// Each tree first records whether its own pre-update vote was
    /// wrong, then trains with a Poisson-drawn weight.
    pub fn learn(&mut self, features: &[f64], class: usize) {
        self.n_updates += 1;
        // Update 0 is reserved for construction.
        let mut rng = derive_rng(self.config.seed, self.n_updates);
        let poisson = Poisson::new(self.config.bagging_lambda).ok();
        for slot in &mut self.slots {
            let prob = slot.tree.predict_prob(features);
            let wrong = (prob > 0.5) != (class == 1);
            slot.errors.push(if wrong { 1.0 } else { 0.0 });
            let weight = poisson.as_ref().map_or(1.0, |d| d.sample(&mut rng));
            slot.tree.learn(features, class, weight, &mut rng);
        }
        if self.n_updates % self.config.drift_check_interval == 0 {
            self.replace_drifted(&mut rng);
        }
    }

    fn replace_drifted(&mut self, rng: &mut StdRng) {
        let threshold = self.config.drift_error_threshold;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !slot.errors.is_full() {
                continue;
            }
            let error = slot.errors.mean().unwrap_or(0.0);
            if error > threshold {
                tracing::debug!(
                    tree = i,
                    windowed_error = error,
                    "replacing drifted classifier tree"
                );
                slot.tree = HoeffdingTree::new(self.n_features, &self.config, rng);
                slot.errors.clear();
                self.n_replacements += 1;
            }
        }
    }

}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegressorSlot {
    tree: RegressionTree,
    /// Absolute prediction errors over the drift window.
    errors: RollingWindow,
}

/// Ensemble of return-regressor trees.
///
/// Drift here is relative: a tree is replaced when its windowed MAE
/// exceeds `drift_mae_factor` times the forest-wide windowed MAE, so
/// a volatility shift that degrades every tree equally replaces none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveForestRegressor {
    slots: Vec<RegressorSlot>,
    n_features: usize,
    config: ModelConfig,
    n_updates: u64,
    n_replacements: u64,
}

impl AdaptiveForestRegressor {
    pub fn new(n_features: usize, config: &ModelConfig) -> Self {
        let mut rng = derive_rng(config.seed ^ REGRESSOR_TAG, 0);
        let slots = (0..config.n_trees)
            .map(|_| RegressorSlot {
                tree: RegressionTree::new(n_features, config, &mut rng),
                errors: RollingWindow::new(config.drift_window),
            })
            .collect();
        Self {
            slots,
            n_features,
            config: *config,
            n_updates: 0,
            n_replacements: 0,
        }
    }

    pub fn n_updates(&self) -> u64 {
        self.n_updates
    }

    pub fn n_replacements(&self) -> u64 {
        self.n_replacements
    }

    /// Mean predicted target across the ensemble.
    pub fn predict(&self, features: &[f64]) -> f64 {
        if self.slots.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .slots
            .iter()
            .map(|s| s.tree.predict(features))
            .sum();
        sum / self.slots.len() as f64
    }

    /// Test-then-train on one sample.
    pub fn learn(&mut self, features: &[f64], target: f64) {
        self.n_updates += 1;
        let mut rng = derive_rng(self.config.seed ^ REGRESSOR_TAG, self.n_updates);
        let poisson = Poisson::new(self.config.bagging_lambda).ok();
        for slot in &mut self.slots {
            let pred = slot.tree.predict(features);
            slot.errors.push((pred - target).abs());
            let weight = poisson.as_ref().map_or(1.0, |d| d.sample(&mut rng));
            slot.tree.learn(features, target, weight, &mut rng);
        }
        if self.n_updates % self.config.drift_check_interval == 0 {
            self.replace_drifted(&mut rng);
        }
    }

    fn replace_drifted(&mut self, rng: &mut StdRng) {
        let full: Vec<f64> = self
            .slots
            .iter()
            .filter(|s| s.errors.is_full())
            .filter_map(|s| s.errors.mean())
            .collect();
        if full.is_empty() {
            return;
        }
        let forest_mae = full.iter().sum::<f64>() / full.len() as f64;
        if forest_mae <= MAE_FLOOR {
            return;
        }
        let cutoff = self.config.drift_mae_factor * forest_mae;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !slot.errors.is_full() {
                continue;
            }
            let mae = slot.errors.mean().unwrap_or(0.0);
            if mae > cutoff {
                tracing::debug!(
                    tree = i,
                    windowed_mae = mae,
                    forest_mae,
                    "replacing drifted regressor tree"
                );
                slot.tree = RegressionTree::new(self.n_features, &self.config, rng);
                slot.errors.clear();
                self.n_replacements += 1;
            }
        }
    }

}
