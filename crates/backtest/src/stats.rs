//! Aggregate statistics over a finished run.

use serde::{Deserialize, Serialize};
use types::{EquityPoint, TradeRecord};

/// Headline figures for one backtest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestStats {
    /// (final - initial) / initial.
    pub total_return: f64,
    /// Winning trades over total trades; 0 when no trades.
    pub win_rate: f64,
    /// Largest peak-to-trough equity decline, as a fraction of the peak.
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub final_balance: f64,
}

impl BacktestStats {
    pub(crate) fn from_run(
        initial_balance: f64,
        final_balance: f64,
        trades: &[TradeRecord],
        equity_curve: &[EquityPoint],
    ) -> Self {
        let wins = trades.iter().filter(|t| t.is_win()).count();
        let win_rate = if trades.is_empty() {
            0.0
        } else {
            wins as f64 / trades.len() as f64
        };
        Self {
            total_return: (final_balance - initial_balance) / initial_balance,
            win_rate,
            max_drawdown: max_drawdown(equity_curve),
            trade_count: trades.len(),
            final_balance,
        }
    }
}

/// Largest fractional decline from a running equity peak.
pub fn max_drawdown(curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for point in curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            worst = worst.max((peak - point.equity) / peak);
        }
    }
    worst
}
