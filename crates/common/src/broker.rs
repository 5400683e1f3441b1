use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Candles, OrderCheckResult, OrderFilter, OrderSendResult, OrderType, PositionFilter, Result,
    Tick, TimeFrame, TradeDeal, TradeOrder, TradePosition, TradeRequest,
};

/// Source of historical candles for a symbol.
///
/// `fetch` returns at most `count` bars, newest last. The newest bar may
/// still be forming.
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn fetch(&self, symbol: &str, timeframe: TimeFrame, count: usize) -> Result<Candles>;
}

/// Abstraction over the brokerage terminal.
///
/// `PaperBroker` implements this for simulation. Only the executors in
/// `crates/engine` should hold a `dyn Broker`; strategies never talk to the
/// broker directly.
///
/// Methods that mirror terminal calls return `Ok(None)` when the terminal
/// answered with nothing, and `Err` when the call itself failed. Callers
/// decide whether either is worth a retry. Implementations must tolerate
/// concurrent calls from several strategies.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Latest quote for a symbol.
    async fn symbol_info_tick(&self, symbol: &str) -> Result<Option<Tick>>;

    /// Number of active pending orders.
    async fn orders_total(&self) -> Result<usize>;

    /// Active pending orders matching the filter.
    async fn orders_get(&self, filter: &OrderFilter) -> Result<Option<Vec<TradeOrder>>>;

    /// Check funds sufficiency and whether the request is executable.
    async fn order_check(&self, request: &TradeRequest) -> Result<Option<OrderCheckResult>>;

    /// Submit a request to the trade server.
    async fn order_send(&self, request: &TradeRequest) -> Result<Option<OrderSendResult>>;

    /// Margin required in account currency.
    async fn order_calc_margin(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: f64,
        price: f64,
    ) -> Result<Option<f64>>;

    /// Profit in account currency for a hypothetical round trip.
    async fn order_calc_profit(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: f64,
        price_open: f64,
        price_close: f64,
    ) -> Result<Option<f64>>;

    /// Open positions matching the filter.
    async fn positions_get(&self, filter: &PositionFilter) -> Result<Option<Vec<TradePosition>>>;

    /// Executed deals in `[from, to]`, optionally restricted to a symbol group.
    async fn history_deals_get(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        group: Option<&str>,
    ) -> Result<Option<Vec<TradeDeal>>>;

    /// Finished orders in `[from, to]`, optionally restricted to a symbol group.
    async fn history_orders_get(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        group: Option<&str>,
    ) -> Result<Option<Vec<TradeOrder>>>;
}
