pub mod binance;
pub mod executor;
pub mod history;
pub mod lifecycle;
pub mod positions;
pub mod retry;
pub mod runner;
pub mod trader;

#[cfg(test)]
mod testing;

pub use binance::BinanceKlines;
pub use executor::OrderExecutor;
pub use history::History;
pub use lifecycle::{Engine, EngineHandle};
pub use positions::Positions;
pub use retry::RetryPolicy;
pub use runner::{RunSummary, StrategyRunner};
pub use trader::{SimpleTrader, TradeOutcome, TraderParams};
