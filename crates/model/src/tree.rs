//! Incremental direction-classifier tree.
//!
//! A binary Hoeffding-style tree grown one sample at a time. Nodes live
//! in a flat arena indexed by position, with `feature == -1` marking
//! leaves. Each leaf watches a random subset of features; for every
//! watched feature it keeps class counts on either side of that
//! feature's running mean, which doubles as the candidate split
//! threshold. After a grace period the leaf splits when the Gini gain
//! of the best candidate beats the runner-up by more than the Hoeffding
//! bound (or the bound has shrunk below the tie threshold).
//!
//! Classes: 0 = down, 1 = up.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use types::ModelConfig;

/// Split-gating statistics for one watched feature at one leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FeatureGate {
    /// Feature index in the full vector.
    feature: usize,
    /// Total weight observed.
    count: f64,
    /// Running weighted mean; also the candidate threshold.
    mean: f64,
    /// Class weights for samples at or below the mean on arrival.
    below: [f64; 2],
    /// Class weights above the mean on arrival.
    above: [f64; 2],
}

impl FeatureGate {
    fn new(feature: usize) -> Self {
        Self {
            feature,
            count: 0.0,
            mean: 0.0,
            below: [0.0; 2],
            above: [0.0; 2],
        }
    }

    fn observe(&mut self, x: f64, class: usize, weight: f64) {
        // Side is judged against the mean before this sample moves it.
        let below = self.count == 0.0 || x <= self.mean;
        self.count += weight;
        self.mean += weight * (x - self.mean) / self.count;
        if below {
            self.below[class] += weight;
        } else {
            self.above[class] += weight;
        }
    }

    /// Gini gain of splitting at the current mean, `None` when a side
    /// is still (near-)empty.
    fn gain(&self) -> Option<f64> {
        let nb = self.below[0] + self.below[1];
        let na = self.above[0] + self.above[1];
        let n = nb + na;
        if nb < 1.0 || na < 1.0 {
            return None;
        }
        let parent = gini(self.below[0] + self.above[0], self.below[1] + self.above[1]);
        let weighted = (nb / n) * gini(self.below[0], self.below[1])
            + (na / n) * gini(self.above[0], self.above[1]);
        Some(parent - weighted)
    }
}

/// Gini impurity of a two-class weight pair.
#[inline]
fn gini(c0: f64, c1: f64) -> f64 {
    let n = c0 + c1;
    if n <= 0.0 {
        return 0.0;
    }
    let p0 = c0 / n;
    let p1 = c1 / n;
    1.0 - p0 * p0 - p1 * p1
}

/// Hoeffding bound for a statistic with range `range` after weight `n`.
#[inline]
pub(crate) fn hoeffding_bound(range: f64, delta: f64, n: f64) -> f64 {
    (range * range * (1.0 / delta).ln() / (2.0 * n)).sqrt()
}

/// Growing statistics held by a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LeafStats {
    class_counts: [f64; 2],
    gates: Vec<FeatureGate>,
    depth: usize,
    /// Weight accumulated since the last split attempt.
    since_check: f64,
}

impl LeafStats {
    fn new(depth: usize, class_counts: [f64; 2], subset: Vec<usize>) -> Self {
        Self {
            class_counts,
            gates: subset.into_iter().map(FeatureGate::new).collect(),
            depth,
            since_check: 0.0,
        }
    }

    /// Laplace-smoothed probability of class 1 (up).
    fn prob_up(&self) -> f64 {
        let n = self.class_counts[0] + self.class_counts[1];
        (self.class_counts[1] + 1.0) / (n + 2.0)
    }
}

/// Arena node. `feature == -1` marks a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TreeNode {
    feature: i32,
    threshold: f64,
    left: i32,
    right: i32,
    leaf: Option<LeafStats>,
}

impl TreeNode {
    fn leaf(stats: LeafStats) -> Self {
        Self {
            feature: -1,
            threshold: 0.0,
            left: -1,
            right: -1,
            leaf: Some(stats),
        }
    }
}

/// One incrementally grown classifier tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoeffdingTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
    subset_size: usize,
    max_depth: usize,
    grace_period: f64,
    delta: f64,
    tie_threshold: f64,
}

impl HoeffdingTree {
    /// Create a single-leaf tree with a freshly sampled feature subset.
    pub fn new(n_features: usize, config: &ModelConfig, rng: &mut StdRng) -> Self {
        let subset_size = subset_size(n_features);
        let root = LeafStats::new(0, [0.0; 2], sample_subset(n_features, subset_size, rng));
        Self {
            nodes: vec![TreeNode::leaf(root)],
            n_features,
            subset_size,
            max_depth: config.max_depth,
            grace_period: config.grace_period as f64,
            delta: config.hoeffding_delta,
            tie_threshold: config.tie_threshold,
        }
    }

    /// Number of arena nodes (1 = still a stump).
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Probability that the next move is up, from the current leaf.
    pub fn predict_prob(&self, features: &[f64]) -> f64 {
        let idx = self.descend(features);
        self.nodes[idx]
            .leaf
            .as_ref()
            .map(|l| l.prob_up())
            .unwrap_or(0.5)
    }

    /// Incorporate one weighted sample (class 0 = down, 1 = up).
    pub fn learn(&mut self, features: &[f64], class: usize, weight: f64, rng: &mut StdRng) {
        debug_assert!(class < 2);
        if weight <= 0.0 {
            return;
        }
        let idx = self.descend(features);
        let (should_try, depth) = {
            let leaf = self.nodes[idx]
                .leaf
                .as_mut()
                .expect("descend always lands on a leaf");
            leaf.class_counts[class] += weight;
            leaf.since_check += weight;
            for gate in &mut leaf.gates {
                gate.observe(features[gate.feature], class, weight);
            }
            (leaf.since_check >= self.grace_period, leaf.depth)
        };
        if should_try && depth < self.max_depth {
            self.try_split(idx, rng);
        }
    }

    /// Walk from the root to the leaf owning `features`.
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
            // NaN or <= threshold goes left (conservative).
            idx = if value.is_nan() || value <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }

    /// Attempt to split leaf `idx` using the Hoeffding bound.
    fn try_split(&mut self, idx: usize, rng: &mut StdRng) {
        let (best, second, total, depth) = {
            let leaf = self.nodes[idx].leaf.as_mut().expect("split target is a leaf");
            leaf.since_check = 0.0;
            let total = leaf.class_counts[0] + leaf.class_counts[1];
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
        let below = gate.below;
        let above = gate.above;

        let left = LeafStats::new(
            depth + 1,
            below,
            sample_subset(self.n_features, self.subset_size, rng),
        );
        let right = LeafStats::new(
            depth + 1,
            above,
            sample_subset(self.n_features, self.subset_size, rng),
        );

        let left_idx = self.nodes.len() as i32;
        self.nodes.push(TreeNode::leaf(left));
        let right_idx = self.nodes.len() as i32;
        self.nodes.push(TreeNode::leaf(right));

        let node = &mut self.nodes[idx];
        node.feature = feature as i32;
        node.threshold = threshold;
        node.left = left_idx;
        node.right = right_idx;
    }
}

/// Per-leaf random-subspace size: ceil(sqrt(n)).
pub(crate) fn subset_size(n_features: usize) -> usize {
    ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features)
}

/// Sample `k` distinct feature indices.
pub(crate) fn sample_subset(n_features: usize, k: usize, rng: &mut StdRng) -> Vec<usize> {
    rand::seq::index::sample(rng, n_features, k.min(n_features)).into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn config() -> ModelConfig {
        ModelConfig {
            grace_period: 20,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_stump_is_neutral() {
        let mut r = rng();
        let tree = HoeffdingTree::new(4, &config(), &mut r);
        assert_eq!(tree.n_nodes(), 1);
        assert!((tree.predict_prob(&[0.0; 4]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_learns_separable_classes() {
        let mut r = rng();
        // Watch every feature so the informative one is always visible.
        let mut tree = HoeffdingTree::new(1, &config(), &mut r);

        // Feature > 0 is always up, < 0 always down.
        for i in 0..400 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let class = if i % 2 == 0 { 1 } else { 0 };
            tree.learn(&[x], class, 1.0, &mut r);
        }

        assert!(tree.n_nodes() > 1, "tree should have split");
        assert!(tree.predict_prob(&[1.0]) > 0.8);
        assert!(tree.predict_prob(&[-1.0]) < 0.2);
    }

    #[test]
    fn test_no_split_on_pure_noise_labels() {
        let mut r = rng();
        let mut tree = HoeffdingTree::new(1, &config(), &mut r);
        // Same feature value for both classes: zero attainable gain.
        for i in 0..500 {
            tree.learn(&[0.0], i % 2, 1.0, &mut r);
        }
        assert_eq!(tree.n_nodes(), 1);
        assert!((tree.predict_prob(&[0.0]) - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_zero_weight_is_ignored() {
        let mut r = rng();
        let mut tree = HoeffdingTree::new(2, &config(), &mut r);
        let before = tree.clone();
        tree.learn(&[1.0, 2.0], 1, 0.0, &mut r);
        assert_eq!(tree, before);
    }

    #[test]
    fn test_depth_cap_holds() {
        let mut r = rng();
        let cfg = ModelConfig {
            max_depth: 1,
            grace_period: 10,
            ..ModelConfig::default()
        };
        let mut tree = HoeffdingTree::new(1, &cfg, &mut r);
        for i in 0..2_000 {
            let x = (i % 7) as f64 - 3.0;
            let class = usize::from(x > 0.0);
            tree.learn(&[x], class, 1.0, &mut r);
        }
        // One split at most: root + two leaves.
        assert!(tree.n_nodes() <= 3);
    }

    #[test]
    fn test_deterministic_given_seed() {
        let build = || {
            let mut r = StdRng::seed_from_u64(99);
            let mut tree = HoeffdingTree::new(3, &config(), &mut r);
            for i in 0..300 {
                let x = [(i % 5) as f64, (i % 3) as f64, 1.0];
                tree.learn(&x, usize::from(i % 5 >= 2), 1.0, &mut r);
            }
            tree
        };
        assert_eq!(build(), build());
    }
}
