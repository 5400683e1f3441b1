//! Scriptable broker for unit tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::{
    retcode, Broker, Error, OrderCheckResult, OrderFilter, OrderSendResult, OrderType,
    PositionFilter, Result, Tick, TradeDeal, TradeOrder, TradePosition, TradeRequest,
};

#[derive(Default)]
pub struct MockBroker {
    pub tick: Mutex<Option<Tick>>,
    /// Number of leading `order_check` calls answered with `None`.
    pub check_nulls: AtomicU32,
    /// Number of leading `order_send` calls answered with `None`.
    pub send_nulls: AtomicU32,
    pub check_retcode: AtomicU32,
    pub send_retcode: Mutex<Option<u32>>,
    pub check_calls: AtomicU32,
    pub send_calls: AtomicU32,
    pub sent: Mutex<Vec<TradeRequest>>,
    pub orders: Mutex<Vec<TradeOrder>>,
    pub positions: Mutex<Option<Vec<TradePosition>>>,
    /// Fail `positions_get` as a transport error.
    pub positions_offline: AtomicBool,
    pub deals: Mutex<Option<Vec<TradeDeal>>>,
    pub history_orders: Mutex<Option<Vec<TradeOrder>>>,
    pub fail_calcs: bool,
}

impl MockBroker {
    pub fn with_tick(bid: f64, ask: f64) -> Self {
        let broker = Self::default();
        *broker.tick.lock().unwrap() = Some(Tick {
            time: 0,
            bid,
            ask,
            last: bid,
        });
        broker
    }

    pub fn sent(&self) -> Vec<TradeRequest> {
        self.sent.lock().unwrap().clone()
    }
}

fn take_null(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Broker for MockBroker {
    async fn symbol_info_tick(&self, _symbol: &str) -> Result<Option<Tick>> {
        Ok(*self.tick.lock().unwrap())
    }

    async fn orders_total(&self) -> Result<usize> {
        Ok(self.orders.lock().unwrap().len())
    }

    async fn orders_get(&self, filter: &OrderFilter) -> Result<Option<Vec<TradeOrder>>> {
        let orders = self.orders.lock().unwrap();
        if orders.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            orders
                .iter()
                .filter(|o| filter.matches(o.ticket, &o.symbol))
                .cloned()
                .collect(),
        ))
    }

    async fn order_check(&self, request: &TradeRequest) -> Result<Option<OrderCheckResult>> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        if take_null(&self.check_nulls) {
            return Ok(None);
        }
        Ok(Some(OrderCheckResult {
            retcode: self.check_retcode.load(Ordering::SeqCst),
            balance: 1_000.0,
            equity: 1_000.0,
            profit: 0.0,
            margin: 10.0,
            margin_free: 990.0,
            margin_level: 0.0,
            comment: String::new(),
            request: request.clone(),
        }))
    }

    async fn order_send(&self, request: &TradeRequest) -> Result<Option<OrderSendResult>> {
        let n = self.send_calls.fetch_add(1, Ordering::SeqCst) as u64;
        if take_null(&self.send_nulls) {
            return Ok(None);
        }
        self.sent.lock().unwrap().push(request.clone());
        let retcode = self.send_retcode.lock().unwrap().unwrap_or(retcode::DONE);
        Ok(Some(OrderSendResult {
            retcode,
            deal: 100 + n,
            order: 200 + n,
            volume: request.volume,
            price: request.price,
            bid: request.price,
            ask: request.price,
            comment: if retcode == retcode::DONE {
                "done".into()
            } else {
                "rejected".into()
            },
            request_id: n,
            retcode_external: 0,
            request: request.clone(),
        }))
    }

    async fn order_calc_margin(
        &self,
        _order_type: OrderType,
        _symbol: &str,
        volume: f64,
        price: f64,
    ) -> Result<Option<f64>> {
        if self.fail_calcs {
            return Err(Error::Broker("terminal offline".into()));
        }
        Ok(Some(volume * price / 100.0))
    }

    async fn order_calc_profit(
        &self,
        order_type: OrderType,
        _symbol: &str,
        volume: f64,
        price_open: f64,
        price_close: f64,
    ) -> Result<Option<f64>> {
        if self.fail_calcs {
            return Err(Error::Broker("terminal offline".into()));
        }
        let diff = if order_type.is_sell() {
            price_open - price_close
        } else {
            price_close - price_open
        };
        Ok(Some(diff * volume))
    }

    async fn positions_get(&self, filter: &PositionFilter) -> Result<Option<Vec<TradePosition>>> {
        if self.positions_offline.load(Ordering::SeqCst) {
            return Err(Error::Broker("terminal offline".into()));
        }
        Ok(self.positions.lock().unwrap().as_ref().map(|all| {
            all.iter()
                .filter(|p| filter.matches(p.ticket, &p.symbol))
                .cloned()
                .collect()
        }))
    }

    async fn history_deals_get(
        &self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
        _group: Option<&str>,
    ) -> Result<Option<Vec<TradeDeal>>> {
        Ok(self.deals.lock().unwrap().clone())
    }

    async fn history_orders_get(
        &self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
        _group: Option<&str>,
    ) -> Result<Option<Vec<TradeOrder>>> {
        Ok(self.history_orders.lock().unwrap().clone())
    }
}

pub fn position(ticket: u64, symbol: &str, order_type: OrderType, volume: f64) -> TradePosition {
    TradePosition {
        ticket,
        symbol: symbol.to_string(),
        order_type,
        volume,
        price_open: 100.0,
        price_current: 100.0,
        sl: 0.0,
        tp: 0.0,
        profit: 0.0,
        time: ticket as i64,
        magic: 0,
        comment: String::new(),
    }
}

pub fn order(ticket: u64, symbol: &str, position_id: u64, time: i64) -> TradeOrder {
    TradeOrder {
        ticket,
        symbol: symbol.to_string(),
        order_type: OrderType::Buy,
        volume_initial: 1.0,
        volume_current: 0.0,
        price_open: 100.0,
        sl: 0.0,
        tp: 0.0,
        time_setup: time,
        time_done: time,
        position_id,
        magic: 0,
        comment: String::new(),
    }
}
