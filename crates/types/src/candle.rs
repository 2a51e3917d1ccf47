//! OHLCV candle input type.
//!
//! Candles are the only market-data input to the core. They arrive
//! already materialized from an external gateway, strictly ordered by
//! timestamp per symbol, and are immutable once observed.

use crate::{Symbol, Timestamp};
use serde::{Deserialize, Serialize};

/// OHLCV candle for a single period, with optional perp funding rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Period end, milliseconds since epoch. Strictly increasing per symbol.
    pub timestamp: Timestamp,
    /// Opening price.
    pub open: f64,
    /// Highest price during the period.
    pub high: f64,
    /// Lowest price during the period.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume during the period.
    pub volume: f64,
    /// Funding rate in effect for the period, when known.
    pub funding_rate: Option<f64>,
}

impl Candle {
    /// Create a candle without funding data.
    pub fn new(
        symbol: impl Into<Symbol>,
        timestamp: Timestamp,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            funding_rate: None,
        }
    }

    /// Attach a funding rate.
    pub fn with_funding(mut self, rate: f64) -> Self {
        self.funding_rate = Some(rate);
        self
    }

    /// Typical price (HLC/3).
    #[inline]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Candle range (high - low).
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Close > open.
    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}
