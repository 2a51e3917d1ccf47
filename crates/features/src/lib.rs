//! Streaming feature computation for the signal core.
//!
//! Converts a per-symbol candle stream into fixed-width feature vectors
//! using bounded rolling windows: no history reprocessing, O(window)
//! memory regardless of stream length.
//!
//! # Modules
//!
//! - [`rolling`] - fixed-capacity rolling window with O(1) push
//! - [`engine`] - the [`FeatureEngine`] itself
//!
//! # Example
//!
//! ```
//! use features::{FeatureEngine, FeatureUpdate};
//! use types::{Candle, FeatureConfig};
//!
//! let mut engine = FeatureEngine::new(FeatureConfig::default());
//! let candle = Candle::new("BTC-USD", 1_000, 100.0, 101.0, 99.0, 100.5, 10.0);
//! match engine.update(&candle).unwrap() {
//!     FeatureUpdate::Ready(vector) => println!("{:?}", vector.values),
//!     FeatureUpdate::NotReady { have, need } => println!("warming {have}/{need}"),
//! }
//! ```

pub mod engine;
pub mod rolling;

pub use engine::{FeatureEngine, FeatureError, FeatureUpdate, Result};
pub use rolling::RollingWindow;
