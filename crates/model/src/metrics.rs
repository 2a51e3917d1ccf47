//! Prequential (test-then-train) evaluation counters.

use features::RollingWindow;
use serde::{Deserialize, Serialize};
use types::ModelMetrics;

/// Trailing window for the `recent_*` figures.
const RECENT_WINDOW: usize = 100;

/// Running accuracy and MAE, all-time and over a trailing window.
///
/// Every figure is scored against the prediction made *before* the
/// model saw the label, so these are honest out-of-sample numbers even
/// though the model trains on every sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrequentialMetrics {
    samples_seen: u64,
    correct: u64,
    abs_error_sum: f64,
    recent_hits: RollingWindow,
    recent_abs_errors: RollingWindow,
}

impl Default for PrequentialMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PrequentialMetrics {
    pub fn new() -> Self {
        Self {
            samples_seen: 0,
            correct: 0,
            abs_error_sum: 0.0,
            recent_hits: RollingWindow::new(RECENT_WINDOW),
            recent_abs_errors: RollingWindow::new(RECENT_WINDOW),
        }
    }

    /// Labeled samples scored so far.
    #[inline]
    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// Score one outcome: the direction call made before training and
    /// the absolute error of the pre-training return estimate.
    pub fn record(&mut self, direction_correct: bool, abs_return_error: f64) {
        self.samples_seen += 1;
        if direction_correct {
            self.correct += 1;
        }
        self.recent_hits.push(if direction_correct { 1.0 } else { 0.0 });
        self.abs_error_sum += abs_return_error;
        self.recent_abs_errors.push(abs_return_error);
    }

    /// All-time directional accuracy (0.5 before any samples).
    pub fn accuracy(&self) -> f64 {
        if self.samples_seen == 0 {
            0.5
        } else {
            self.correct as f64 / self.samples_seen as f64
        }
    }

    /// Trailing-window directional accuracy.
    pub fn recent_accuracy(&self) -> f64 {
        self.recent_hits.mean().unwrap_or(0.5)
    }

    /// All-time mean absolute error of the return estimate.
    pub fn mae(&self) -> f64 {
        if self.samples_seen == 0 {
            0.0
        } else {
            self.abs_error_sum / self.samples_seen as f64
        }
    }

    /// Trailing-window MAE.
    pub fn recent_mae(&self) -> f64 {
        self.recent_abs_errors.mean().unwrap_or(0.0)
    }

    /// Snapshot for embedding in signals and reports.
    pub fn snapshot(&self) -> ModelMetrics {
        ModelMetrics {
            samples_seen: self.samples_seen,
            accuracy: self.accuracy(),
            recent_accuracy: self.recent_accuracy(),
            mae: self.mae(),
            recent_mae: self.recent_mae(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics_are_neutral() {
        let m = PrequentialMetrics::new();
        assert_eq!(m.samples_seen(), 0);
        assert_eq!(m.accuracy(), 0.5);
        assert_eq!(m.recent_accuracy(), 0.5);
        assert_eq!(m.mae(), 0.0);
    }

    #[test]
    fn test_accuracy_and_mae_accumulate() {
        let mut m = PrequentialMetrics::new();
        m.record(true, 0.01);
        m.record(true, 0.03);
        m.record(false, 0.02);
        m.record(false, 0.04);
        assert_eq!(m.samples_seen(), 4);
        assert!((m.accuracy() - 0.5).abs() < 1e-12);
        assert!((m.mae() - 0.025).abs() < 1e-12);
    }

    #[test]
    fn test_recent_window_forgets_old_outcomes() {
        let mut m = PrequentialMetrics::new();
        // 100 misses, then 100 hits: recent window holds only the hits.
        for _ in 0..100 {
            m.record(false, 0.05);
        }
        for _ in 0..100 {
            m.record(true, 0.01);
        }
        assert!((m.accuracy() - 0.5).abs() < 1e-12);
        assert!((m.recent_accuracy() - 1.0).abs() < 1e-12);
        assert!((m.recent_mae() - 0.01).abs() < 1e-12);
        assert!((m.mae() - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_mirrors_accessors() {
        let mut m = PrequentialMetrics::new();
        m.record(true, 0.02);
        let snap = m.snapshot();
        assert_eq!(snap.samples_seen, 1);
        assert_eq!(snap.accuracy, m.accuracy());
        assert_eq!(snap.recent_mae, m.recent_mae());
    }
}
