//! End-to-end walk-forward properties over synthetic streams.

use backtest::{generate, run_portfolio, BacktestError, Backtester, SyntheticConfig};
use strategy::{EngineConfig, StrategyEngine};
use types::{
    AccountState, BacktestConfig, Candle, FeatureConfig, ModelConfig, SignalStrength,
};

fn engine_config(seed: u64) -> EngineConfig {
    EngineConfig {
        features: FeatureConfig {
            short_window: 5,
            long_window: 20,
            rsi_period: 7,
            bollinger_window: 10,
            volatility_window: 10,
            funding_window: 10,
        },
        model: ModelConfig {
            n_trees: 5,
            grace_period: 15,
            min_samples: 20,
            ..ModelConfig::default()
        }
        .with_seed(seed),
        ..EngineConfig::default()
    }
}

fn backtest_config() -> BacktestConfig {
    BacktestConfig {
        warmup_candles: 60,
        initial_balance: 10_000.0,
    }
}

fn run(seed: u64, stream: &SyntheticConfig, n: usize) -> backtest::BacktestReport {
    let candles = generate("BTC", n, stream, seed);
    let mut backtester = Backtester::new(engine_config(seed), backtest_config());
    backtester.run("BTC", &candles).expect("run succeeds")
}

#[test]
fn test_equity_identity_and_monotone_curve() {
    let report = run(42, &SyntheticConfig::volatile(), 800);

    let mut last_ts = 0;
    for point in &report.equity_curve {
        assert!(point.timestamp > last_ts, "equity curve out of order");
        last_ts = point.timestamp;
        assert!(point.equity.is_finite());
    }

    let realized: f64 = report.trades.iter().map(|t| t.pnl).sum();
    let expected = backtest_config().initial_balance + realized;
    assert!(
        (report.stats.final_balance - expected).abs() < 1e-6,
        "final balance {} != initial + realized {}",
        report.stats.final_balance,
        expected
    );
    if let Some(last) = report.equity_curve.last() {
        assert!((last.equity - report.stats.final_balance).abs() < 1e-6);
    }
}

#[test]
fn test_replay_is_deterministic() {
    let a = run(7, &SyntheticConfig::trending(), 600);
    let b = run(7, &SyntheticConfig::trending(), 600);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn test_signals_respect_risk_limits() {
    let account = AccountState::default();
    let mut engine = StrategyEngine::new(engine_config(9));
    let candles = generate("BTC", 1_000, &SyntheticConfig::volatile(), 9);
    for candle in &candles {
        let Some(signal) = engine.on_candle("BTC", candle, &account).unwrap() else {
            continue;
        };
        let stop_distance = (signal.suggested_entry - signal.stop_loss).abs();
        assert!(signal.suggested_size > 0.0);
        assert!(signal.suggested_size <= account.max_position_size + 1e-9);
        assert!(
            signal.suggested_size * stop_distance
                <= account.max_portfolio_risk * account.balance + 1e-6
        );
        assert!(
            signal.suggested_size * signal.suggested_entry
                <= account.max_leverage * account.balance + 1e-6
        );
        assert!(signal.confidence > 0.55);
        assert!(signal.risk_reward_ratio > 1.0);
    }
}

#[test]
fn test_flat_market_emits_no_trades() {
    let candles: Vec<Candle> = (0..120)
        .map(|i| Candle::new("BTC", (i + 1) * 60_000, 100.0, 100.0, 100.0, 100.0, 50.0))
        .collect();
    let mut backtester = Backtester::new(engine_config(1), backtest_config());
    let report = backtester.run("BTC", &candles).unwrap();
    assert_eq!(report.stats.trade_count, 0);
    assert_eq!(report.stats.final_balance, backtest_config().initial_balance);
    assert_eq!(report.stats.max_drawdown, 0.0);
}

#[test]
fn test_too_few_candles_is_an_error() {
    let candles = generate("BTC", 30, &SyntheticConfig::sideways(), 2);
    let mut backtester = Backtester::new(engine_config(2), backtest_config());
    assert!(matches!(
        backtester.run("BTC", &candles),
        Err(BacktestError::NotEnoughCandles { have: 30, .. })
    ));
}

#[test]
fn test_sharp_drop_after_uptrend_never_strong_buy() {
    // Warm start on a noisy uptrend, then hand the engine one crash
    // candle. Whatever it says about the crash, it must not be a
    // strong buy.
    let config = engine_config(11);
    let mut engine = StrategyEngine::new(config);
    let account = AccountState::default();
    let candles = generate(
        "BTC",
        700,
        &SyntheticConfig::trending().with_drift(0.003),
        11,
    );
    for candle in &candles {
        engine.observe("BTC", candle).unwrap();
    }

    let last = candles.last().unwrap();
    let crash_close = last.close * 0.85;
    let crash = Candle::new(
        "BTC",
        last.timestamp + 60_000,
        last.close,
        last.close,
        crash_close * 0.995,
        crash_close,
        500.0,
    );
    let signal = engine.on_candle("BTC", &crash, &account).unwrap();
    if let Some(signal) = signal {
        assert_ne!(signal.strength, SignalStrength::StrongBuy);
    }
}

#[test]
fn test_portfolio_matches_sequential_runs() {
    // Each stream carries its own per-symbol config, so a sequential
    // loop over the same pairs must reproduce the parallel results.
    let streams: Vec<(String, EngineConfig, Vec<Candle>)> = vec![
        (
            "BTC".into(),
            engine_config(3),
            generate("BTC", 500, &SyntheticConfig::trending(), 3),
        ),
        (
            "ETH".into(),
            engine_config(4),
            generate("ETH", 500, &SyntheticConfig::volatile(), 4),
        ),
        (
            "SOL".into(),
            engine_config(5),
            generate("SOL", 500, &SyntheticConfig::sideways(), 5),
        ),
    ];
    let parallel = run_portfolio(backtest_config(), streams.clone());
    assert_eq!(parallel.len(), 3);

    for ((symbol, config, candles), (par_symbol, par_report)) in streams.iter().zip(&parallel) {
        assert_eq!(symbol, par_symbol);
        let mut backtester = Backtester::new(*config, backtest_config());
        let sequential = backtester.run(symbol, candles).unwrap();
        let parallel_report = par_report.as_ref().expect("portfolio run succeeds");
        assert_eq!(
            serde_json::to_string(&sequential).unwrap(),
            serde_json::to_string(parallel_report).unwrap()
        );
    }
}
