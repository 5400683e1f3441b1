use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use common::{OrderType, Sessions};
use strategy::Strategy;

use crate::trader::{SimpleTrader, TradeOutcome};

/// Delay between polls while waiting for a new bar.
pub const IDLE_SHORT: Duration = Duration::from_secs(2);

/// Wall-clock source used for session checks.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Counters reported by a runner when its loop ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub name: String,
    pub symbol: String,
    /// Number of `watch_market` evaluations.
    pub cycles: u64,
    /// Orders the broker accepted.
    pub orders_placed: u64,
    /// Cycles that ended in an error backoff.
    pub errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    WaitSession,
    Poll,
    IdleShort,
    Act { order_type: OrderType, snooze: Duration },
    Sleep(Duration),
    ErrorBackoff,
    Exit,
}

/// Drives one strategy instance: polls it, places its orders and sleeps
/// between cycles until the session closes or the token is cancelled.
pub struct StrategyRunner {
    strategy: Box<dyn Strategy>,
    trader: SimpleTrader,
    sessions: Sessions,
    cancel: CancellationToken,
    idle: Duration,
    clock: Clock,
}

impl StrategyRunner {
    pub fn new(strategy: Box<dyn Strategy>, trader: SimpleTrader, sessions: Sessions) -> Self {
        Self {
            strategy,
            trader,
            sessions,
            cancel: CancellationToken::new(),
            idle: IDLE_SHORT,
            clock: Arc::new(Utc::now),
        }
    }

    /// Stop the loop when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Read the time for session checks from `clock` instead of `Utc::now`.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn name(&self) -> &str {
        self.strategy.name()
    }

    /// The trading loop. Errors inside a cycle never end it; only a closed
    /// session or cancellation does.
    pub async fn trade(mut self) -> RunSummary {
        let mut summary = RunSummary {
            name: self.strategy.name().to_string(),
            symbol: self.strategy.symbol().to_string(),
            ..Default::default()
        };
        let base = self.strategy.base_interval();
        let clock = self.clock.clone();
        info!(strategy = %summary.name, symbol = %summary.symbol, "Trading loop started");

        let mut state = State::WaitSession;
        loop {
            state = match state {
                State::WaitSession => {
                    if !self.sessions.wait_until_open_with(&self.cancel, || clock()).await {
                        State::Exit
                    } else if pause(&self.cancel, base).await {
                        State::Poll
                    } else {
                        State::Exit
                    }
                }

                State::Poll => {
                    if self.cancel.is_cancelled() {
                        State::Exit
                    } else if !self.sessions.is_open(clock()) {
                        info!(strategy = %summary.name, "Trading session closed");
                        State::Exit
                    } else {
                        summary.cycles += 1;
                        let decision = self.strategy.watch_market().await;
                        match decision.order_type {
                            _ if !decision.new => State::IdleShort,
                            Some(order_type) => State::Act {
                                order_type,
                                snooze: decision.snooze,
                            },
                            None => State::Sleep(decision.snooze),
                        }
                    }
                }

                State::IdleShort => pause_then_poll(&self.cancel, self.idle).await,

                State::Act { order_type, snooze } => {
                    match self.trader.place_trade(&summary.symbol, order_type).await {
                        Ok(TradeOutcome::Filled(_)) => {
                            summary.orders_placed += 1;
                            State::Sleep(snooze)
                        }
                        Ok(TradeOutcome::Rejected { .. }) => State::Sleep(snooze),
                        Err(e) => {
                            error!(
                                strategy = %summary.name,
                                symbol = %summary.symbol,
                                order_type = %order_type,
                                error = %e,
                                "Trade placement failed"
                            );
                            State::ErrorBackoff
                        }
                    }
                }

                State::Sleep(d) => {
                    debug!(strategy = %summary.name, secs = d.as_secs(), "Sleeping");
                    pause_then_poll(&self.cancel, d).await
                }

                State::ErrorBackoff => {
                    summary.errors += 1;
                    pause_then_poll(&self.cancel, base).await
                }

                State::Exit => break,
            };
        }

        info!(
            strategy = %summary.name,
            cycles = summary.cycles,
            orders = summary.orders_placed,
            errors = summary.errors,
            "Trading loop stopped"
        );
        summary
    }
}

/// Sleep for `d`. Returns `false` if cancelled first.
async fn pause(cancel: &CancellationToken, d: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(d) => true,
    }
}

async fn pause_then_poll(cancel: &CancellationToken, d: Duration) -> State {
    if pause(cancel, d).await {
        State::Poll
    } else {
        State::Exit
    }
}
