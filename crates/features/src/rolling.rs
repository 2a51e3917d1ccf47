//! Fixed-capacity rolling window.
//!
//! Backs every feature computation in this crate. Push is O(1) with a
//! running sum; statistics are computed on demand over at most
//! `capacity` values.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A bounded rolling window of `f64` values.
///
/// Holds the most recent `capacity` values, discarding the oldest on
/// overflow. Serializable so feature-engine state can be checkpointed.
///
/// # Example
/// ```
/// use features::rolling::RollingWindow;
///
/// let mut window = RollingWindow::new(3);
/// window.push(1.0);
/// window.push(2.0);
/// window.push(3.0);
/// assert_eq!(window.mean(), Some(2.0));
///
/// window.push(4.0); // drops 1.0
/// assert_eq!(window.mean(), Some(3.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindow {
    data: VecDeque<f64>,
    capacity: usize,
    /// Running sum for O(1) mean.
    sum: f64,
}

impl RollingWindow {
    /// Create a window with the given capacity.
    ///
    /// # Panics
    /// Panics if capacity is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RollingWindow capacity must be > 0");
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    /// Push a value, returning the evicted value when full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let removed = if self.data.len() >= self.capacity {
            let old = self.data.pop_front();
            if let Some(v) = old {
                self.sum -= v;
            }
            old
        } else {
            None
        };

        self.data.push_back(value);
        self.sum += value;
        removed
    }

    /// Values currently held.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no values are held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when at capacity.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }

    /// Window capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mean of held values, `None` when empty.
    #[inline]
    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.sum / self.data.len() as f64)
        }
    }

    /// Population variance, `None` with fewer than 2 values.
    pub fn variance(&self) -> Option<f64> {
        if self.data.len() < 2 {
            return None;
        }
        let mean = self.sum / self.data.len() as f64;
        let sum_sq: f64 = self.data.iter().map(|v| (v - mean).powi(2)).sum();
        Some(sum_sq / self.data.len() as f64)
    }

    /// Population standard deviation, `None` with fewer than 2 values.
    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(|v| v.sqrt())
    }

    /// Most recent value.
    #[inline]
    pub fn last(&self) -> Option<f64> {
        self.data.back().copied()
    }

    /// Value `steps` back from the most recent (0 = most recent).
    #[inline]
    pub fn back(&self, steps: usize) -> Option<f64> {
        let len = self.data.len();
        if steps >= len {
            None
        } else {
            self.data.get(len - 1 - steps).copied()
        }
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    /// Mean over only the most recent `n` values.
    pub fn tail_mean(&self, n: usize) -> Option<f64> {
        let len = self.data.len();
        if n == 0 || len < n {
            return None;
        }
        Some(self.data.iter().skip(len - n).sum::<f64>() / n as f64)
    }

    /// Population standard deviation over only the most recent `n` values.
    pub fn tail_std_dev(&self, n: usize) -> Option<f64> {
        let len = self.data.len();
        if n < 2 || len < n {
            return None;
        }
        let mean = self.tail_mean(n)?;
        let sum_sq: f64 = self
            .data
            .iter()
            .skip(len - n)
            .map(|v| (v - mean).powi(2))
            .sum();
        Some((sum_sq / n as f64).sqrt())
    }

    /// Drop all values.
    pub fn clear(&mut self) {
        self.data.clear();
        self.sum = 0.0;
    }
}
