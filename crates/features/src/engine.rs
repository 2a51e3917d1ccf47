//! The streaming feature engine.
//!
//! One engine per symbol. Each candle advances a set of bounded rolling
//! windows and, once the longest window is warm, yields a fixed-width
//! [`FeatureVector`]. The engine never emits a partial vector: until it
//! is ready the caller gets [`FeatureUpdate::NotReady`].
//!
//! Timestamp ordering is an input contract: an out-of-order or duplicate
//! candle fails the call without touching any buffer, so the caller can
//! re-sequence and continue.

use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use types::{Candle, FeatureConfig, FeatureVec, FeatureVector, N_FEATURES, Timestamp};

use crate::rolling::RollingWindow;

/// Result type for feature-engine operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Errors raised at the feature-engine boundary.
///
/// All variants are fatal to the call, never to the engine: state is
/// unchanged and the next well-formed candle proceeds normally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    /// Candle timestamp not strictly greater than the previous one.
    #[error("non-monotonic candle timestamp: got {got}, previous {prev}")]
    NonMonotonicTimestamp { prev: Timestamp, got: Timestamp },

    /// Candle carries non-finite or non-positive prices, or negative volume.
    #[error("malformed candle at {timestamp}: {reason}")]
    MalformedCandle { timestamp: Timestamp, reason: String },
}

/// Outcome of feeding one candle to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureUpdate {
    /// Windows are warm; a full feature vector was produced.
    Ready(FeatureVector),
    /// Still warming up: `have` of `need` candles seen.
    NotReady { have: usize, need: usize },
}

impl FeatureUpdate {
    /// Unwrap the ready vector, `None` while warming.
    pub fn ready(self) -> Option<FeatureVector> {
        match self {
            FeatureUpdate::Ready(v) => Some(v),
            FeatureUpdate::NotReady { .. } => None,
        }
    }
}

/// Streaming per-symbol feature engine.
///
/// Pure given its buffer state: the same candle sequence always produces
/// the same vectors. Instances share no state, so symbols can be
/// processed concurrently by giving each its own engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEngine {
    config: FeatureConfig,
    /// Close prices, sized to the longest configured window.
    closes: RollingWindow,
    /// Volumes, sized like `closes`.
    volumes: RollingWindow,
    /// One-period returns for realized volatility.
    returns: RollingWindow,
    /// Raw close-to-close changes for the RSI oscillator.
    changes: RollingWindow,
    /// Funding rates, when the stream carries them.
    funding: RollingWindow,
    /// Streaming EMAs, seeded with the first close.
    ema_short: Option<f64>,
    ema_long: Option<f64>,
    last_timestamp: Option<Timestamp>,
}

impl FeatureEngine {
    /// Create an engine for one symbol stream.
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            closes: RollingWindow::new(config.long_window),
            volumes: RollingWindow::new(config.long_window),
            returns: RollingWindow::new(config.volatility_window),
            changes: RollingWindow::new(config.rsi_period),
            funding: RollingWindow::new(config.funding_window),
            ema_short: None,
            ema_long: None,
            last_timestamp: None,
            config,
        }
    }

    /// Candles seen so far (bounded by the long window).
    pub fn candles_seen(&self) -> usize {
        self.closes.len()
    }

    /// True once the longest window is filled.
    pub fn is_ready(&self) -> bool {
        self.closes.is_full()
    }

    /// Feed one candle, producing a feature vector once warm.
    ///
    /// # Errors
    /// [`FeatureError::NonMonotonicTimestamp`] for out-of-order or
    /// duplicate candles, [`FeatureError::MalformedCandle`] for
    /// non-finite inputs. State is untouched on error.
    pub fn update(&mut self, candle: &Candle) -> Result<FeatureUpdate> {
        self.validate(candle)?;

        if let Some(prev_close) = self.closes.last() {
            self.changes.push(candle.close - prev_close);
            self.returns.push(candle.close / prev_close - 1.0);
        }
        self.closes.push(candle.close);
        self.volumes.push(candle.volume);
        if let Some(rate) = candle.funding_rate {
            self.funding.push(rate);
        }
        self.ema_short = Some(ema_step(
            self.ema_short,
            candle.close,
            self.config.short_window,
        ));
        self.ema_long = Some(ema_step(
            self.ema_long,
            candle.close,
            self.config.long_window,
        ));
        self.last_timestamp = Some(candle.timestamp);

        if !self.closes.is_full() {
            return Ok(FeatureUpdate::NotReady {
                have: self.closes.len(),
                need: self.config.long_window,
            });
        }

        Ok(FeatureUpdate::Ready(self.extract(candle)))
    }

    fn validate(&self, candle: &Candle) -> Result<()> {
        if let Some(prev) = self.last_timestamp {
            if candle.timestamp <= prev {
                return Err(FeatureError::NonMonotonicTimestamp {
                    prev,
                    got: candle.timestamp,
                });
            }
        }
        let prices = [candle.open, candle.high, candle.low, candle.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(FeatureError::MalformedCandle {
                timestamp: candle.timestamp,
                reason: "prices must be finite and positive".into(),
            });
        }
        if !candle.volume.is_finite() || candle.volume < 0.0 {
            return Err(FeatureError::MalformedCandle {
                timestamp: candle.timestamp,
                reason: "volume must be finite and non-negative".into(),
            });
        }
        if let Some(rate) = candle.funding_rate {
            if !rate.is_finite() {
                return Err(FeatureError::MalformedCandle {
                    timestamp: candle.timestamp,
                    reason: "funding rate must be finite".into(),
                });
            }
        }
        Ok(())
    }

    /// Compute the full vector. Only called once every window is warm,
    /// so the unwraps on window statistics cannot fire.
    fn extract(&self, candle: &Candle) -> FeatureVector {
        let cfg = &self.config;
        let close = candle.close;

        let sma_short = self.closes.tail_mean(cfg.short_window).unwrap_or(close);
        let sma_long = self.closes.mean().unwrap_or(close);
        let sma_ratio = sma_short / sma_long;
        let ema_ratio = match (self.ema_short, self.ema_long) {
            (Some(s), Some(l)) if l > 0.0 => s / l,
            _ => 1.0,
        };
        let trend = close / sma_long - 1.0;

        let momentum_5 = self.momentum(5, close);
        let momentum_10 = self.momentum(10, close);

        let rsi = self.rsi();
        let bollinger_z = self.bollinger_z(close);

        let volatility = self.returns.std_dev().unwrap_or(0.0);

        let volume_ratio = match self.volumes.mean() {
            Some(mean) if mean > 0.0 => candle.volume / mean,
            _ => 1.0,
        };

        let (funding_mean, funding_std) = self.funding_stats();

        let values: FeatureVec = smallvec![
            sma_ratio,
            ema_ratio,
            trend,
            momentum_5,
            momentum_10,
            rsi,
            bollinger_z,
            volatility,
            volume_ratio,
            funding_mean,
            funding_std,
        ];
        debug_assert_eq!(values.len(), N_FEATURES);

        FeatureVector {
            timestamp: candle.timestamp,
            close,
            values,
        }
    }

    /// Percentage change over a `lookback`-period horizon.
    fn momentum(&self, lookback: usize, close: f64) -> f64 {
        match self.closes.back(lookback) {
            Some(past) if past > 0.0 => close / past - 1.0,
            _ => 0.0,
        }
    }

    /// Bounded relative-strength oscillator from average gains vs losses.
    /// Defined as neutral 50 when all moves are zero.
    fn rsi(&self) -> f64 {
        let n = self.changes.len();
        if n == 0 {
            return 50.0;
        }
        let (gains, losses) = self
            .changes
            .iter()
            .fold((0.0f64, 0.0f64), |(g, l), change| {
                if change > 0.0 { (g + change, l) } else { (g, l - change) }
            });
        let avg_gain = gains / n as f64;
        let avg_loss = losses / n as f64;
        if avg_gain == 0.0 && avg_loss == 0.0 {
            50.0
        } else if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        }
    }

    /// (price - rolling mean) / rolling std, clipped to +-3 to bound
    /// outlier influence.
    fn bollinger_z(&self, close: f64) -> f64 {
        let n = self.config.bollinger_window;
        match (self.closes.tail_mean(n), self.closes.tail_std_dev(n)) {
            (Some(mean), Some(std)) if std > 1e-12 => ((close - mean) / std).clamp(-3.0, 3.0),
            _ => 0.0,
        }
    }

    /// Funding-rate rolling mean and dispersion, neutral zeros when the
    /// stream carries no funding data.
    fn funding_stats(&self) -> (f64, f64) {
        match self.funding.len() {
            0 => (0.0, 0.0),
            1 => (self.funding.last().unwrap_or(0.0), 0.0),
            _ => (
                self.funding.mean().unwrap_or(0.0),
                self.funding.std_dev().unwrap_or(0.0),
            ),
        }
    }
}

/// One step of exponential smoothing with the conventional 2/(n+1) factor.
#[inline]
fn ema_step(prev: Option<f64>, value: f64, period: usize) -> f64 {
    match prev {
        None => value,
        Some(p) => {
            let alpha = 2.0 / (period as f64 + 1.0);
            p + alpha * (value - p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_candle(ts: Timestamp) -> Candle {
        Candle::new("TEST", ts, 100.0, 100.0, 100.0, 100.0, 10.0)
    }

    fn engine() -> FeatureEngine {
        FeatureEngine::new(FeatureConfig::default())
    }

    #[test]
    fn test_not_ready_until_long_window() {
        let mut eng = engine();
        let need = FeatureConfig::default().long_window;

        for i in 0..need - 1 {
            let update = eng.update(&flat_candle(1_000 + i as u64)).unwrap();
            assert!(
                matches!(update, FeatureUpdate::NotReady { .. }),
                "candle {} should not be ready",
                i
            );
        }

        let update = eng.update(&flat_candle(1_000 + need as u64)).unwrap();
        match update {
            FeatureUpdate::Ready(v) => {
                assert_eq!(v.values.len(), N_FEATURES);
                assert!(v.is_finite());
            }
            other => panic!("expected Ready, got {:?}", other),
        }
    }

    #[test]
    fn test_flat_stream_neutral_features() {
        let mut eng = engine();
        let mut last = None;
        for i in 0..60u64 {
            last = eng.update(&flat_candle(1_000 + i)).unwrap().ready();
        }
        let v = last.expect("engine should be ready after 60 candles");
        assert!((v.feature("volatility").unwrap()).abs() < 1e-12);
        assert!((v.feature("rsi").unwrap() - 50.0).abs() < 1e-9);
        assert!((v.feature("bollinger_z").unwrap()).abs() < 1e-12);
        assert!((v.feature("sma_ratio").unwrap() - 1.0).abs() < 1e-12);
        assert!((v.feature("momentum_5").unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_uptrend_features_point_up() {
        let mut eng = engine();
        let mut last = None;
        for i in 0..80u64 {
            let price = 100.0 + i as f64;
            let c = Candle::new("TEST", 1_000 + i, price, price + 0.5, price - 0.5, price, 10.0);
            last = eng.update(&c).unwrap().ready();
        }
        let v = last.unwrap();
        assert!(v.feature("momentum_5").unwrap() > 0.0);
        assert!(v.feature("momentum_10").unwrap() > 0.0);
        assert!(v.feature("trend").unwrap() > 0.0);
        // Monotone gains, zero losses.
        assert!((v.feature("rsi").unwrap() - 100.0).abs() < 1e-9);
        assert!(v.feature("sma_ratio").unwrap() > 1.0);
    }

    #[test]
    fn test_out_of_order_rejected_without_corruption() {
        let mut eng = engine();
        eng.update(&flat_candle(1_000)).unwrap();
        eng.update(&flat_candle(1_001)).unwrap();

        let err = eng.update(&flat_candle(1_001)).unwrap_err();
        assert_eq!(
            err,
            FeatureError::NonMonotonicTimestamp {
                prev: 1_001,
                got: 1_001
            }
        );
        let err = eng.update(&flat_candle(500)).unwrap_err();
        assert!(matches!(err, FeatureError::NonMonotonicTimestamp { .. }));

        // Engine still healthy: buffers untouched, next valid candle works.
        assert_eq!(eng.candles_seen(), 2);
        eng.update(&flat_candle(1_002)).unwrap();
        assert_eq!(eng.candles_seen(), 3);
    }

    #[test]
    fn test_malformed_candle_rejected() {
        let mut eng = engine();
        let mut bad = flat_candle(1_000);
        bad.close = f64::NAN;
        assert!(matches!(
            eng.update(&bad),
            Err(FeatureError::MalformedCandle { .. })
        ));

        let mut negative = flat_candle(1_000);
        negative.low = -1.0;
        assert!(eng.update(&negative).is_err());
        assert_eq!(eng.candles_seen(), 0);
    }

    #[test]
    fn test_funding_defaults_without_data() {
        let mut eng = engine();
        let mut last = None;
        for i in 0..50u64 {
            last = eng.update(&flat_candle(1_000 + i)).unwrap().ready();
        }
        let v = last.unwrap();
        assert_eq!(v.feature("funding_mean"), Some(0.0));
        assert_eq!(v.feature("funding_std"), Some(0.0));
    }

    #[test]
    fn test_funding_stats_with_data() {
        let mut eng = engine();
        let mut last = None;
        for i in 0..50u64 {
            let c = flat_candle(1_000 + i).with_funding(0.0001);
            last = eng.update(&c).unwrap().ready();
        }
        let v = last.unwrap();
        assert!((v.feature("funding_mean").unwrap() - 0.0001).abs() < 1e-12);
        assert!((v.feature("funding_std").unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_vectors_always_finite() {
        let mut eng = engine();
        // Jagged prices with volume spikes and occasional funding.
        for i in 0..200u64 {
            let price = 100.0 + ((i as f64) * 0.7).sin() * 20.0;
            let volume = if i % 17 == 0 { 0.0 } else { 5.0 + (i % 7) as f64 };
            let mut c = Candle::new("TEST", 1_000 + i, price, price * 1.01, price * 0.99, price, volume);
            if i % 3 == 0 {
                c = c.with_funding(-0.0002 + (i % 5) as f64 * 0.0001);
            }
            if let Some(v) = eng.update(&c).unwrap().ready() {
                assert!(v.is_finite(), "non-finite vector at candle {}: {:?}", i, v);
            }
        }
    }

    #[test]
    fn test_engine_state_serializes() {
        let mut eng = engine();
        for i in 0..10u64 {
            eng.update(&flat_candle(1_000 + i)).unwrap();
        }
        let json = serde_json::to_string(&eng).unwrap();
        let mut restored: FeatureEngine = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.candles_seen(), 10);
        // Restored engine keeps enforcing the timestamp contract.
        assert!(restored.update(&flat_candle(900)).is_err());
    }
}
