//! Position sizing and exit placement.
//!
//! A pure function of price, volatility, confidence, and account
//! limits. The stake is Kelly-inspired and scaled by confidence, then
//! capped three ways; the binding constraint is whichever cap is
//! smallest. Degenerate inputs produce a zero size, never a clamped
//! "least unsafe" value.

use serde::{Deserialize, Serialize};
use types::{AccountState, RiskConfig, Side};

/// Sizing decision for one prospective position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    /// Position size in base units; 0 means do not trade.
    pub size: f64,
    /// Stop distance from entry, in quote currency.
    pub stop_distance: f64,
    /// Take-profit distance from entry, in quote currency.
    pub take_distance: f64,
    /// Reward distance over risk distance.
    pub risk_reward: f64,
}

impl PositionSizing {
    /// The do-not-trade decision.
    pub fn zero() -> Self {
        Self {
            size: 0.0,
            stop_distance: 0.0,
            take_distance: 0.0,
            risk_reward: 0.0,
        }
    }

    /// Stop-loss price for a position entered at `entry`.
    pub fn stop_price(&self, entry: f64, side: Side) -> f64 {
        match side {
            Side::Long => entry - self.stop_distance,
            Side::Short => entry + self.stop_distance,
        }
    }

    /// Take-profit price for a position entered at `entry`.
    pub fn take_price(&self, entry: f64, side: Side) -> f64 {
        match side {
            Side::Long => entry + self.take_distance,
            Side::Short => entry - self.take_distance,
        }
    }
}

/// Stateless sizing rules parameterized by [`RiskConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Size a prospective position.
    ///
    /// `volatility` is the fractional per-candle return volatility from
    /// the feature engine; `confidence` the model's combined confidence
    /// in (0, 1]. Caps applied, smallest wins:
    /// - `max_position_size` in base units,
    /// - `max_portfolio_risk x balance / stop_distance` (risk cap),
    /// - `max_leverage x balance / price` (notional cap).
    pub fn size_position(
        &self,
        account: &AccountState,
        price: f64,
        volatility: f64,
        confidence: f64,
    ) -> PositionSizing {
        if !price.is_finite()
            || price <= 0.0
            || !volatility.is_finite()
            || volatility <= 0.0
            || !confidence.is_finite()
            || confidence <= 0.0
            || account.balance <= 0.0
        {
            return PositionSizing::zero();
        }

        let stop_distance = self.config.stop_vol_mult * volatility * price;
        if stop_distance <= 0.0 || !stop_distance.is_finite() {
            return PositionSizing::zero();
        }
        let take_distance = self.config.take_profit_ratio * stop_distance;

        // Kelly stake for payoff ratio b with win probability proxied
        // by confidence: f* = (p(b + 1) - 1) / b, floored at zero.
        let b = self.config.take_profit_ratio;
        let p = 0.5 + 0.5 * confidence;
        let kelly = ((p * (b + 1.0) - 1.0) / b).max(0.0);
        let fraction = self.config.kelly_fraction * kelly;

        let desired = fraction * account.balance / price;
        let risk_cap = account.max_portfolio_risk * account.balance / stop_distance;
        let leverage_cap = account.max_leverage * account.balance / price;

        let size = desired
            .min(account.max_position_size)
            .min(risk_cap)
            .min(leverage_cap);

        if !size.is_finite() || size <= 0.0 {
            return PositionSizing::zero();
        }

        PositionSizing {
            size,
            stop_distance,
            take_distance,
            risk_reward: self.config.take_profit_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> RiskManager {
        RiskManager::new(RiskConfig::default())
    }

    #[test]
    fn test_zero_volatility_gives_zero_size() {
        let account = AccountState::default();
        let s = manager().size_position(&account, 100.0, 0.0, 0.9);
        assert_eq!(s.size, 0.0);
    }

    #[test]
    fn test_degenerate_inputs_give_zero_size() {
        let account = AccountState::default();
        let m = manager();
        assert_eq!(m.size_position(&account, f64::NAN, 0.01, 0.9).size, 0.0);
        assert_eq!(m.size_position(&account, 100.0, f64::INFINITY, 0.9).size, 0.0);
        assert_eq!(m.size_position(&account, 100.0, 0.01, 0.0).size, 0.0);
        assert_eq!(m.size_position(&account, -5.0, 0.01, 0.9).size, 0.0);

        let broke = AccountState::with_balance(0.0);
        assert_eq!(m.size_position(&broke, 100.0, 0.01, 0.9).size, 0.0);
    }

    #[test]
    fn test_risk_cap_inequality_holds() {
        let account = AccountState::default();
        let m = manager();
        for vol in [0.001, 0.005, 0.02, 0.1] {
            for conf in [0.6, 0.75, 0.95] {
                let s = m.size_position(&account, 250.0, vol, conf);
                assert!(
                    s.size * s.stop_distance
                        <= account.max_portfolio_risk * account.balance + 1e-9,
                    "risk cap violated at vol {vol} conf {conf}"
                );
                assert!(
                    s.size * 250.0 <= account.max_leverage * account.balance + 1e-9,
                    "leverage cap violated at vol {vol} conf {conf}"
                );
                assert!(s.size <= account.max_position_size + 1e-12);
            }
        }
    }

    #[test]
    fn test_higher_confidence_never_shrinks_size() {
        let account = AccountState::default();
        let m = manager();
        let low = m.size_position(&account, 100.0, 0.01, 0.6);
        let high = m.size_position(&account, 100.0, 0.01, 0.9);
        assert!(high.size >= low.size);
    }

    #[test]
    fn test_exit_distances_and_placement() {
        let account = AccountState::default();
        let s = manager().size_position(&account, 100.0, 0.01, 0.8);
        assert!(s.size > 0.0);
        // stop = 2 x 0.01 x 100 = 2, take = 2.5 x stop = 5.
        assert!((s.stop_distance - 2.0).abs() < 1e-12);
        assert!((s.take_distance - 5.0).abs() < 1e-12);
        assert!((s.risk_reward - 2.5).abs() < 1e-12);

        assert!((s.stop_price(100.0, Side::Long) - 98.0).abs() < 1e-12);
        assert!((s.take_price(100.0, Side::Long) - 105.0).abs() < 1e-12);
        assert!((s.stop_price(100.0, Side::Short) - 102.0).abs() < 1e-12);
        assert!((s.take_price(100.0, Side::Short) - 95.0).abs() < 1e-12);
    }
}
