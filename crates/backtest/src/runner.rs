//! Walk-forward backtest loop.
//!
//! Three phases per symbol. Warm start feeds candles through the
//! feature/label/train path with signals disabled. Replay walks the
//! remaining candles in order: manage the open position against the
//! candle's high/low, otherwise let the strategy open one; every close
//! feeds its realized return back into the model. Finalize force-closes
//! any open position at the last close, so final equity always equals
//! the initial balance plus the sum of realized PnLs.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strategy::{EngineConfig, StrategyEngine, StrategyError};
use thiserror::Error;
use types::{
    AccountState, BacktestConfig, Candle, EquityPoint, ExitReason, Side, Symbol, Timestamp,
    TradeRecord, TradeSignal,
};

use crate::stats::BacktestStats;

/// Errors terminating a backtest run.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    #[error("need more than {need} candles to warm up, got {have}")]
    NotEnoughCandles { have: usize, need: usize },
}

pub type Result<T> = std::result::Result<T, BacktestError>;

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub symbol: Symbol,
    pub stats: BacktestStats,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

/// A live position during replay.
#[derive(Debug, Clone, Copy)]
struct OpenPosition {
    side: Side,
    entry_time: Timestamp,
    entry_price: f64,
    size: f64,
    stop_loss: f64,
    take_profit: f64,
}

impl OpenPosition {
    fn from_signal(signal: &TradeSignal) -> Self {
        Self {
            side: signal.side,
            entry_time: signal.timestamp,
            entry_price: signal.suggested_entry,
            size: signal.suggested_size,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
        }
    }

    /// Exit triggered by this candle, if any. The stop is checked first:
    /// when both levels fall inside one candle's range the worse fill is
    /// assumed.
    fn exit_on(&self, candle: &Candle) -> Option<(f64, ExitReason)> {
        match self.side {
            Side::Long => {
                if candle.low <= self.stop_loss {
                    Some((self.stop_loss, ExitReason::StopLoss))
                } else if candle.high >= self.take_profit {
                    Some((self.take_profit, ExitReason::TakeProfit))
                } else {
                    None
                }
            }
            Side::Short => {
                if candle.high >= self.stop_loss {
                    Some((self.stop_loss, ExitReason::StopLoss))
                } else if candle.low <= self.take_profit {
                    Some((self.take_profit, ExitReason::TakeProfit))
                } else {
                    None
                }
            }
        }
    }

    fn close(&self, symbol: &str, exit_time: Timestamp, exit_price: f64, reason: ExitReason) -> TradeRecord {
        let direction = match self.side {
            Side::Long => 1.0,
            Side::Short => -1.0,
        };
        let pnl = direction * (exit_price - self.entry_price) * self.size;
        let return_pct = direction * (exit_price - self.entry_price) / self.entry_price;
        TradeRecord {
            symbol: symbol.to_string(),
            side: self.side,
            entry_time: self.entry_time,
            exit_time,
            entry_price: self.entry_price,
            exit_price,
            size: self.size,
            pnl,
            return_pct,
            exit_reason: reason,
        }
    }

    /// Mark-to-market PnL at the given price.
    fn unrealized(&self, price: f64) -> f64 {
        let direction = match self.side {
            Side::Long => 1.0,
            Side::Short => -1.0,
        };
        direction * (price - self.entry_price) * self.size
    }
}

/// Walk-forward simulator owning one strategy engine.
#[derive(Debug)]
pub struct Backtester {
    engine: StrategyEngine,
    config: BacktestConfig,
}

impl Backtester {
    pub fn new(engine_config: EngineConfig, config: BacktestConfig) -> Self {
        Self {
            engine: StrategyEngine::new(engine_config),
            config,
        }
    }

    /// Run one symbol's candle stream through all three phases.
    pub fn run(&mut self, symbol: &str, candles: &[Candle]) -> Result<BacktestReport> {
        if candles.len() <= self.config.warmup_candles {
            return Err(BacktestError::NotEnoughCandles {
                have: candles.len(),
                need: self.config.warmup_candles,
            });
        }
        let (warmup, replay) = candles.split_at(self.config.warmup_candles);

        tracing::info!(symbol, candles = warmup.len(), "warm start");
        for candle in warmup {
            self.engine.observe(symbol, candle)?;
        }

        tracing::info!(symbol, candles = replay.len(), "replay");
        let mut account = AccountState::with_balance(self.config.initial_balance);
        let mut position: Option<OpenPosition> = None;
        let mut trades: Vec<TradeRecord> = Vec::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(replay.len());
        let last_index = replay.len() - 1;

        for (i, candle) in replay.iter().enumerate() {
            match position.take() {
                Some(open) => {
                    // The candle still trains the model even while a
                    // position is being managed.
                    self.engine.observe(symbol, candle)?;
                    match open.exit_on(candle) {
                        Some((price, reason)) => {
                            let trade = open.close(symbol, candle.timestamp, price, reason);
                            self.settle(&mut account, &mut trades, trade);
                        }
                        None => position = Some(open),
                    }
                }
                None => {
                    if let Some(signal) = self.engine.on_candle(symbol, candle, &account)? {
                        position = Some(OpenPosition::from_signal(&signal));
                    }
                }
            }

            // Stream over: realize whatever is still open at the last close.
            if i == last_index {
                if let Some(open) = position.take() {
                    let trade =
                        open.close(symbol, candle.timestamp, candle.close, ExitReason::EndOfData);
                    self.settle(&mut account, &mut trades, trade);
                }
            }

            let unrealized = position.map_or(0.0, |p| p.unrealized(candle.close));
            equity_curve.push(EquityPoint {
                timestamp: candle.timestamp,
                equity: account.balance + unrealized,
            });
        }

        let stats = BacktestStats::from_run(
            self.config.initial_balance,
            account.balance,
            &trades,
            &equity_curve,
        );
        tracing::info!(
            symbol,
            trades = stats.trade_count,
            total_return = stats.total_return,
            max_drawdown = stats.max_drawdown,
            "backtest finished"
        );
        Ok(BacktestReport {
            symbol: symbol.to_string(),
            stats,
            trades,
            equity_curve,
        })
    }

    /// Model health after the run, for reporting.
    pub fn model_metrics(&self, symbol: &str) -> Option<types::ModelMetrics> {
        self.engine.model_metrics(symbol)
    }

    /// The engine with all state learned during the run, e.g. for
    /// checkpointing before a live handover.
    pub fn into_engine(self) -> StrategyEngine {
        self.engine
    }

    fn settle(
        &mut self,
        account: &mut AccountState,
        trades: &mut Vec<TradeRecord>,
        trade: TradeRecord,
    ) {
        account.balance += trade.pnl;
        tracing::debug!(
            symbol = %trade.symbol,
            side = %trade.side,
            pnl = trade.pnl,
            reason = %trade.exit_reason,
            "position closed"
        );
        self.engine
            .update_with_trade_outcome(&trade.symbol, trade.return_pct);
        trades.push(trade);
    }
}

/// Run several independent symbol streams in parallel.
///
/// Each stream carries its own engine config (e.g. a per-symbol seed)
/// and gets its own engine, so there is no shared mutable state and the
/// per-symbol results match sequential runs exactly.
pub fn run_portfolio(
    config: BacktestConfig,
    streams: Vec<(Symbol, EngineConfig, Vec<Candle>)>,
) -> Vec<(Symbol, Result<BacktestReport>)> {
    streams
        .into_par_iter()
        .map(|(symbol, engine_config, candles)| {
            let mut backtester = Backtester::new(engine_config, config);
            let report = backtester.run(&symbol, &candles);
            (symbol, report)
        })
        .collect()
}
