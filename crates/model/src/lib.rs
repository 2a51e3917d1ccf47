//! Online predictive model for the signal core.
//!
//! Two streaming estimators share one feature stream: a binary
//! direction classifier and a return regressor, each an adaptive forest
//! of incrementally grown randomized trees. Trees carry a windowed
//! drift detector; a tree whose recent error exceeds its threshold is
//! replaced with a freshly seeded one, so the ensemble re-weights
//! toward the current regime without manual retraining.
//!
//! The only public surface is [`PredictiveModel`]:
//! `predict` / `update` / `metrics` / `to_json` / `from_json`. Internal
//! tree state is never exposed, so callers cannot break the
//! test-then-train (prequential) ordering that `update` enforces.
//!
//! # Modules
//!
//! - [`normalizer`] - Welford-style running feature normalization
//! - [`tree`] - incremental direction-classifier tree
//! - [`reg_tree`] - incremental return-regressor tree
//! - [`forest`] - adaptive forests with Poisson bagging + drift replacement
//! - [`metrics`] - prequential accuracy/MAE tracking

pub mod forest;
pub mod metrics;
pub mod normalizer;
pub mod predictive;
pub mod reg_tree;
pub mod tree;

pub use metrics::PrequentialMetrics;
pub use normalizer::OnlineNormalizer;
pub use predictive::{ModelError, PredictiveModel};
