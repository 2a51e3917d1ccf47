//! Account state and realized trade records.

use crate::{Side, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

/// Account limits and balance, read-only to the risk manager.
///
/// Mutated only by the backtester (or a live execution layer) after a
/// trade closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    /// Current account balance in quote currency.
    pub balance: f64,
    /// Absolute cap on position size in base units.
    pub max_position_size: f64,
    /// Maximum notional leverage (notional / balance).
    pub max_leverage: f64,
    /// Maximum fraction of balance at risk per position.
    pub max_portfolio_risk: f64,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            balance: 10_000.0,
            max_position_size: 10.0,
            max_leverage: 5.0,
            max_portfolio_risk: 0.02,
        }
    }
}

impl AccountState {
    /// Account with the given balance and default limits.
    pub fn with_balance(balance: f64) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// Stream ended with the position still open; closed at last close.
    EndOfData,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::TakeProfit => write!(f, "take-profit"),
            ExitReason::EndOfData => write!(f, "end-of-data"),
        }
    }
}

/// A completed round-trip trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: Symbol,
    pub side: Side,
    pub entry_time: Timestamp,
    pub exit_time: Timestamp,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Position size in base units.
    pub size: f64,
    /// Realized PnL in quote currency.
    pub pnl: f64,
    /// Signed fractional return on the entry price.
    pub return_pct: f64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    /// True when the trade made money.
    #[inline]
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

/// One point of a backtest equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: Timestamp,
    pub equity: f64,
}
