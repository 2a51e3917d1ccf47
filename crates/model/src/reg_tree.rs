//! Incremental return-regressor tree.
//!
//! Shares the arena skeleton of the classifier tree but scores
//! candidate splits by variance reduction of the regression target.
//! Leaves predict their running target mean.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use types::ModelConfig;

use crate::tree::{hoeffding_bound, sample_subset, subset_size};

/// Weighted running moments (Welford).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
struct Moments {
    count: f64,
    mean: f64,
    m2: f64,
}

impl Moments {
    fn observe(&mut self, y: f64, weight: f64) {
        self.count += weight;
        let delta = y - self.mean;
        self.mean += weight * delta / self.count;
        self.m2 += weight * delta * (y - self.mean);
    }

    fn variance(&self) -> f64 {
        if self.count < 2.0 {
            0.0
        } else {
            self.m2 / self.count
        }
    }

    /// Moments of the union of two populations.
    fn merged(a: &Moments, b: &Moments) -> Moments {
        let count = a.count + b.count;
        if count <= 0.0 {
            return Moments::default();
        }
        let mean = (a.count * a.mean + b.count * b.mean) / count;
        let delta = b.mean - a.mean;
        let m2 = a.m2 + b.m2 + delta * delta * a.count * b.count / count;
        Moments { count, mean, m2 }
    }
}

/// Split-gating statistics for one watched feature at one leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegGate {
    feature: usize,
    count: f64,
    /// Running mean of the feature; the candidate threshold.
    mean: f64,
    below: Moments,
    above: Moments,
}

impl RegGate {
    fn new(feature: usize) -> Self {
        Self {
            feature,
            count: 0.0,
            mean: 0.0,
            below: Moments::default(),
            above: Moments::default(),
        }
    }

    fn observe(&mut self, x: f64, y: f64, weight: f64) {
        let below = self.count == 0.0 || x <= self.mean;
        self.count += weight;
        self.mean += weight * (x - self.mean) / self.count;
        if below {
            self.below.observe(y, weight);
        } else {
            self.above.observe(y, weight);
        }
    }

    /// Normalized variance reduction in [0, 1], `None` when a side is
    /// still too thin to trust.
    fn gain(&self) -> Option<f64> {
        if self.below.count < 2.0 || self.above.count < 2.0 {
            return None;
        }
        let parent = Moments::merged(&self.below, &self.above);
        let var_p = parent.variance();
        if var_p <= 1e-18 {
            return None;
        }
        let n = parent.count;
        let weighted = (self.below.count / n) * self.below.variance()
            + (self.above.count / n) * self.above.variance();
        Some(((var_p - weighted) / var_p).clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegLeaf {
    target: Moments,
    gates: Vec<RegGate>,
    depth: usize,
    since_check: f64,
}

impl RegLeaf {
    fn new(depth: usize, target: Moments, subset: Vec<usize>) -> Self {
        Self {
            target,
            gates: subset.into_iter().map(RegGate::new).collect(),
            depth,
            since_check: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegNode {
    feature: i32,
    threshold: f64,
    left: i32,
    right: i32,
    leaf: Option<RegLeaf>,
}

impl RegNode {
    fn leaf(stats: RegLeaf) -> Self {
        Self {
            feature: -1,
            threshold: 0.0,
            left: -1,
            right: -1,
            leaf: Some(stats),
        }
    }
}

/// One incrementally grown regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<RegNode>,
    n_features: usize,
    subset_size: usize,
    max_depth: usize,
    grace_period: f64,
    delta: f64,
    tie_threshold: f64,
}

impl RegressionTree {
    /// Create a single-leaf tree with a freshly sampled feature subset.
    pub fn new(n_features: usize, config: &ModelConfig, rng: &mut StdRng) -> Self {
        let subset = subset_size(n_features);
        let root = RegLeaf::new(
            0,
            Moments::default(),
            sample_subset(n_features, subset, rng),
        );
        Self {
            nodes: vec![RegNode::leaf(root)],
            n_features,
            subset_size: subset,
            max_depth: config.max_depth,
            grace_period: config.grace_period as f64,
            delta: config.hoeffding_delta,
            tie_threshold: config.tie_threshold,
        }
    }

    /// Number of arena nodes.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Predicted target from the leaf owning `features` (0 before any data).
    pub fn predict(&self, features: &[f64]) -> f64 {
        let idx = self.descend(features);
        self.nodes[idx]
            .leaf
            .as_ref()
            .map(|l| if l.target.count > 0.0 { l.target.mean } else { 0.0 })
            .unwrap_or(0.0)
    }

    /// Incorporate one weighted sample.
    pub fn learn(&mut self, features: &[f64], target: f64, weight: f64, rng: &mut StdRng) {
        if weight <= 0.0 {
            return;
        }
        let idx = self.descend(features);
        let (should_try, depth) = {
            let leaf = self.nodes[idx]
                .leaf
                .as_mut()
                .expect("descend always lands on a leaf");
            leaf.target.observe(target, weight);
            leaf.since_check += weight;
            for gate in &mut leaf.gates {
                gate.observe(features[gate.feature], target, weight);
            }
            (leaf.since_check >= self.grace_period, leaf.depth)
        };
        if should_try && depth < self.max_depth {
            self.try_split(idx, rng);
        }
    }

    fn descend(&self, features: &[f64]) -> usize {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.feature < 0 {
                return idx;
            }
            let value = features
                .get(node.feature as usize)
                .copied()
                .unwrap_or(f64::NAN);
            idx = if value.is_nan() || value <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }

    fn try_split(&mut self, idx: usize, rng: &mut StdRng) {
        let (best, second, total, depth) = {
            let leaf = self.nodes[idx].leaf.as_mut().expect("split target is a leaf");
            leaf.since_check = 0.0;
            let total = leaf.target.count;
            let mut best: Option<(f64, usize)> = None;
            let mut second = 0.0f64;
            for (gi, gate) in leaf.gates.iter().enumerate() {
                if let Some(gain) = gate.gain() {
                    match best {
                        Some((bg, _)) if gain <= bg => second = second.max(gain),
                        _ => {
                            if let Some((bg, _)) = best {
                                second = second.max(bg);
                            }
                            best = Some((gain, gi));
                        }
                    }
                }
            }
            (best, second, total, leaf.depth)
        };

        let Some((best_gain, gate_idx)) = best else {
            return;
        };
        let bound = hoeffding_bound(1.0, self.delta, total);
        if best_gain <= 0.0 || (best_gain - second <= bound && bound >= self.tie_threshold) {
            return;
        }

        let leaf = self.nodes[idx].leaf.take().expect("leaf checked above");
        let gate = &leaf.gates[gate_idx];
        let feature = gate.feature;
        let threshold = gate.mean;

        let left = RegLeaf::new(
            depth + 1,
            gate.below,
            sample_subset(self.n_features, self.subset_size, rng),
        );
        let right = RegLeaf::new(
            depth + 1,
            gate.above,
            sample_subset(self.n_features, self.subset_size, rng),
        );

        let left_idx = self.nodes.len() as i32;
        self.nodes.push(RegNode::leaf(left));
        let right_idx = self.nodes.len() as i32;
        self.nodes.push(RegNode::leaf(right));

        let node = &mut self.nodes[idx];
        node.feature = feature as i32;
        node.threshold = threshold;
        node.left = left_idx;
        node.right = right_idx;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn config() -> ModelConfig {
        ModelConfig {
            grace_period: 25,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_empty_tree_predicts_zero() {
        let mut r = rng();
        let tree = RegressionTree::new(4, &config(), &mut r);
        assert_eq!(tree.predict(&[1.0; 4]), 0.0);
    }

    #[test]
    fn test_learns_step_function() {
        let mut r = rng();
        let mut tree = RegressionTree::new(1, &config(), &mut r);
        // y = +0.02 when x > 0, -0.02 otherwise, with slight jitter.
        for i in 0..600 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let y = if i % 2 == 0 { 0.02 } else { -0.02 };
            let jitter = ((i % 5) as f64 - 2.0) * 1e-4;
            tree.learn(&[x], y + jitter, 1.0, &mut r);
        }
        assert!(tree.n_nodes() > 1, "tree should have split");
        assert!(tree.predict(&[1.0]) > 0.01);
        assert!(tree.predict(&[-1.0]) < -0.01);
    }

    #[test]
    fn test_constant_target_no_split() {
        let mut r = rng();
        let mut tree = RegressionTree::new(2, &config(), &mut r);
        for i in 0..500 {
            tree.learn(&[(i % 9) as f64, (i % 4) as f64], 0.005, 1.0, &mut r);
        }
        assert_eq!(tree.n_nodes(), 1);
        assert!((tree.predict(&[0.0, 0.0]) - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_moments_merge_matches_direct() {
        let mut a = Moments::default();
        let mut b = Moments::default();
        let mut all = Moments::default();
        for (i, y) in [1.0, 2.0, 3.0, 10.0, 11.0, 12.0].iter().enumerate() {
            if i < 3 {
                a.observe(*y, 1.0);
            } else {
                b.observe(*y, 1.0);
            }
            all.observe(*y, 1.0);
        }
        let merged = Moments::merged(&a, &b);
        assert!((merged.mean - all.mean).abs() < 1e-9);
        assert!((merged.variance() - all.variance()).abs() < 1e-9);
    }
}
