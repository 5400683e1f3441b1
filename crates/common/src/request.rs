use serde::{Deserialize, Serialize};

use crate::{DealEntry, OrderFilling, OrderTime, OrderType, TradeAction};

/// Broker return codes for trade operations.
pub mod retcode {
    /// `order_check` success.
    pub const CHECK_OK: u32 = 0;
    pub const REQUOTE: u32 = 10004;
    pub const REJECT: u32 = 10006;
    pub const CANCEL: u32 = 10007;
    pub const PLACED: u32 = 10008;
    pub const DONE: u32 = 10009;
    pub const ERROR: u32 = 10011;
    pub const INVALID: u32 = 10013;
    pub const INVALID_VOLUME: u32 = 10014;
    pub const INVALID_PRICE: u32 = 10015;
    pub const MARKET_CLOSED: u32 = 10018;
    pub const NO_MONEY: u32 = 10019;
    pub const INVALID_ORDER: u32 = 10035;
    pub const POSITION_CLOSED: u32 = 10036;
}

/// One order attempt.
///
/// Build with [`TradeRequest::new`], which applies the required defaults
/// (`Deal` action, `Day` lifetime, fill-or-kill), then override fields with
/// the builder methods. A request is never mutated once handed to the
/// executor; each attempt path builds its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub action: TradeAction,
    pub magic: u64,
    /// Pending order ticket, for `Modify` and `Remove`.
    pub order: u64,
    pub symbol: String,
    pub volume: f64,
    pub price: f64,
    pub stoplimit: f64,
    pub sl: f64,
    pub tp: f64,
    /// Maximum acceptable slippage in points.
    pub deviation: u32,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub type_filling: OrderFilling,
    pub type_time: OrderTime,
    /// Unix seconds, only meaningful with `Specified` lifetimes.
    pub expiration: i64,
    pub comment: String,
    /// Position ticket to close or modify.
    pub position: u64,
    pub position_by: u64,
}

impl TradeRequest {
    pub fn new(symbol: impl Into<String>, volume: f64) -> Self {
        Self {
            action: TradeAction::Deal,
            magic: 0,
            order: 0,
            symbol: symbol.into(),
            volume,
            price: 0.0,
            stoplimit: 0.0,
            sl: 0.0,
            tp: 0.0,
            deviation: 0,
            order_type: OrderType::Buy,
            type_filling: OrderFilling::Fok,
            type_time: OrderTime::Day,
            expiration: 0,
            comment: String::new(),
            position: 0,
            position_by: 0,
        }
    }

    pub fn action(mut self, action: TradeAction) -> Self {
        self.action = action;
        self
    }

    pub fn order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    pub fn type_time(mut self, type_time: OrderTime) -> Self {
        self.type_time = type_time;
        self
    }

    pub fn type_filling(mut self, type_filling: OrderFilling) -> Self {
        self.type_filling = type_filling;
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn sl(mut self, sl: f64) -> Self {
        self.sl = sl;
        self
    }

    pub fn tp(mut self, tp: f64) -> Self {
        self.tp = tp;
        self
    }

    pub fn deviation(mut self, deviation: u32) -> Self {
        self.deviation = deviation;
        self
    }

    pub fn magic(mut self, magic: u64) -> Self {
        self.magic = magic;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn position(mut self, ticket: u64) -> Self {
        self.position = ticket;
        self
    }

    pub fn order(mut self, ticket: u64) -> Self {
        self.order = ticket;
        self
    }

    pub fn expiration(mut self, expiration: i64) -> Self {
        self.expiration = expiration;
        self
    }
}

/// Broker verdict on whether a request can be executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCheckResult {
    pub retcode: u32,
    pub balance: f64,
    pub equity: f64,
    pub profit: f64,
    pub margin: f64,
    pub margin_free: f64,
    pub margin_level: f64,
    pub comment: String,
    pub request: TradeRequest,
}

impl OrderCheckResult {
    pub fn is_ok(&self) -> bool {
        self.retcode == retcode::CHECK_OK
    }
}

/// Broker response to a submitted request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSendResult {
    pub retcode: u32,
    /// Deal ticket, when a deal was executed.
    pub deal: u64,
    /// Order ticket, when an order was placed.
    pub order: u64,
    pub volume: f64,
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    pub comment: String,
    pub request_id: u64,
    pub retcode_external: i32,
    pub request: TradeRequest,
}

impl OrderSendResult {
    /// Executed as a deal, or accepted as a pending order.
    pub fn is_success(&self) -> bool {
        matches!(self.retcode, retcode::DONE | retcode::PLACED)
    }
}

/// Snapshot of a broker-resident order (pending or historical).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrder {
    pub ticket: u64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub volume_initial: f64,
    pub volume_current: f64,
    pub price_open: f64,
    pub sl: f64,
    pub tp: f64,
    pub time_setup: i64,
    /// Zero while the order is still pending.
    pub time_done: i64,
    pub position_id: u64,
    pub magic: u64,
    pub comment: String,
}

/// Snapshot of an open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePosition {
    pub ticket: u64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub volume: f64,
    pub price_open: f64,
    pub price_current: f64,
    pub sl: f64,
    pub tp: f64,
    pub profit: f64,
    pub time: i64,
    pub magic: u64,
    pub comment: String,
}

/// Snapshot of an executed deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDeal {
    pub ticket: u64,
    pub order: u64,
    pub position_id: u64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub entry: DealEntry,
    pub volume: f64,
    pub price: f64,
    pub profit: f64,
    pub time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_market_day_fok() {
        let req = TradeRequest::new("BTCUSDT", 0.01);
        assert_eq!(req.action, TradeAction::Deal);
        assert_eq!(req.type_time, OrderTime::Day);
        assert_eq!(req.type_filling, OrderFilling::Fok);
        assert_eq!(req.symbol, "BTCUSDT");
        assert_eq!(req.volume, 0.01);
    }

    #[test]
    fn request_overrides_are_kept_verbatim() {
        let req = TradeRequest::new("ETHUSDT", 1.0)
            .action(TradeAction::Pending)
            .type_time(OrderTime::Gtc)
            .type_filling(OrderFilling::Ioc);
        assert_eq!(req.action, TradeAction::Pending);
        assert_eq!(req.type_time, OrderTime::Gtc);
        assert_eq!(req.type_filling, OrderFilling::Ioc);

        // one override leaves the other defaults alone
        let req = TradeRequest::new("ETHUSDT", 1.0).type_filling(OrderFilling::Return);
        assert_eq!(req.action, TradeAction::Deal);
        assert_eq!(req.type_time, OrderTime::Day);
        assert_eq!(req.type_filling, OrderFilling::Return);
    }

    #[test]
    fn request_serializes_type_field() {
        let req = TradeRequest::new("BTCUSDT", 0.5).order_type(OrderType::Sell);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "SELL");
        assert_eq!(json["action"], "DEAL");
        assert_eq!(json["type_filling"], "FOK");
    }
}
