use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::{
    retcode, Bar, Broker, CandleSource, Candles, DealEntry, Error, OrderCheckResult, OrderFilter,
    OrderSendResult, OrderType, PositionFilter, Result, Tick, TimeFrame, TradeAction, TradeDeal,
    TradeOrder, TradePosition, TradeRequest,
};

/// Simulated broker for paper trading.
///
/// Market deals fill at the latest known price with configurable spread and
/// slippage. Prices come from the candles served through [`CandleSource`]
/// or from [`PaperBroker::update_price`]. Nothing ever leaves the process.
pub struct PaperBroker {
    ledger: RwLock<Ledger>,
    series: RwLock<HashMap<(String, TimeFrame), Vec<Bar>>>,
    feed: Option<Arc<dyn CandleSource>>,
    /// Slippage in basis points applied to market fills.
    slippage_bps: f64,
    /// Full bid/ask spread in basis points of the price.
    spread_bps: f64,
    leverage: f64,
}

#[derive(Default)]
struct Ledger {
    balance: f64,
    prices: HashMap<String, f64>,
    positions: Vec<TradePosition>,
    orders: Vec<TradeOrder>,
    history_orders: Vec<TradeOrder>,
    deals: Vec<TradeDeal>,
    next_ticket: u64,
}

impl Ledger {
    fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn floating_profit(&self) -> f64 {
        self.positions
            .iter()
            .map(|p| match self.prices.get(&p.symbol) {
                Some(&price) => profit(p.order_type, p.volume, p.price_open, price),
                None => p.profit,
            })
            .sum()
    }

    fn equity(&self) -> f64 {
        self.balance + self.floating_profit()
    }
}

fn profit(order_type: OrderType, volume: f64, open: f64, close: f64) -> f64 {
    if order_type.is_sell() {
        (open - close) * volume
    } else {
        (close - open) * volume
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

impl PaperBroker {
    pub fn new(initial_balance: f64, slippage_bps: f64, leverage: f64) -> Self {
        info!(
            balance = initial_balance,
            slippage_bps, leverage, "PaperBroker initialized"
        );
        Self {
            ledger: RwLock::new(Ledger {
                balance: initial_balance,
                ..Default::default()
            }),
            series: RwLock::new(HashMap::new()),
            feed: None,
            slippage_bps,
            spread_bps: 0.0,
            leverage: leverage.max(1.0),
        }
    }

    /// Serve candles from `feed` for any series not loaded in memory.
    pub fn with_feed(mut self, feed: Arc<dyn CandleSource>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_spread_bps(mut self, spread_bps: f64) -> Self {
        self.spread_bps = spread_bps;
        self
    }

    /// Replace the in-memory series for `symbol` on `timeframe`.
    pub async fn load_candles(&self, symbol: &str, timeframe: TimeFrame, bars: Vec<Bar>) -> Result<()> {
        let candles = Candles::new(bars)?;
        if let Some(last) = candles.last() {
            self.update_price(symbol, last.close).await;
        }
        self.series
            .write()
            .await
            .insert((symbol.to_string(), timeframe), candles.bars().to_vec());
        Ok(())
    }

    pub async fn update_price(&self, symbol: &str, price: f64) {
        self.ledger.write().await.prices.insert(symbol.to_string(), price);
    }

    pub async fn balance(&self) -> f64 {
        self.ledger.read().await.balance
    }

    pub async fn equity(&self) -> f64 {
        self.ledger.read().await.equity()
    }

    fn half_spread(&self, price: f64) -> f64 {
        price * self.spread_bps / 20_000.0
    }

    fn margin(&self, volume: f64, price: f64) -> f64 {
        volume * price / self.leverage
    }

    fn used_margin(&self, ledger: &Ledger) -> f64 {
        ledger
            .positions
            .iter()
            .map(|p| self.margin(p.volume, p.price_open))
            .sum()
    }

    /// Fill price for a market deal of `order_type` at mid `price`.
    fn fill_price(&self, order_type: OrderType, price: f64) -> f64 {
        let half = self.half_spread(price);
        let slip = self.slippage_bps / 10_000.0;
        if order_type.is_buy() {
            (price + half) * (1.0 + slip)
        } else {
            (price - half) * (1.0 - slip)
        }
    }

    fn result(&self, request: &TradeRequest, code: u32, comment: &str) -> OrderSendResult {
        OrderSendResult {
            retcode: code,
            deal: 0,
            order: 0,
            volume: 0.0,
            price: 0.0,
            bid: 0.0,
            ask: 0.0,
            comment: comment.to_string(),
            request_id: 0,
            retcode_external: 0,
            request: request.clone(),
        }
    }

    fn record_deal(
        &self,
        ledger: &mut Ledger,
        request: &TradeRequest,
        position_id: u64,
        entry: DealEntry,
        price: f64,
        volume: f64,
        realized: f64,
    ) -> (u64, u64) {
        let time = now();
        let order = ledger.ticket();
        let deal = ledger.ticket();
        ledger.history_orders.push(TradeOrder {
            ticket: order,
            symbol: request.symbol.clone(),
            order_type: request.order_type,
            volume_initial: volume,
            volume_current: 0.0,
            price_open: price,
            sl: request.sl,
            tp: request.tp,
            time_setup: time,
            time_done: time,
            position_id,
            magic: request.magic,
            comment: request.comment.clone(),
        });
        ledger.deals.push(TradeDeal {
            ticket: deal,
            order,
            position_id,
            symbol: request.symbol.clone(),
            order_type: request.order_type,
            entry,
            volume,
            price,
            profit: realized,
            time,
        });
        (order, deal)
    }

    fn open_position(&self, ledger: &mut Ledger, request: &TradeRequest) -> OrderSendResult {
        if !matches!(request.order_type, OrderType::Buy | OrderType::Sell) {
            return self.result(request, retcode::INVALID_ORDER, "Invalid order type for deal");
        }
        if request.volume <= 0.0 {
            return self.result(request, retcode::INVALID_VOLUME, "Invalid volume");
        }
        let Some(&mid) = ledger.prices.get(&request.symbol) else {
            return self.result(request, retcode::INVALID_PRICE, "No price");
        };

        let margin = self.margin(request.volume, mid);
        let free = ledger.equity() - self.used_margin(ledger);
        if margin > free {
            return self.result(request, retcode::NO_MONEY, "No money");
        }

        let fill = self.fill_price(request.order_type, mid);
        let ticket = ledger.ticket();
        let (order, deal) =
            self.record_deal(ledger, request, ticket, DealEntry::In, fill, request.volume, 0.0);
        ledger.positions.push(TradePosition {
            ticket,
            symbol: request.symbol.clone(),
            order_type: request.order_type,
            volume: request.volume,
            price_open: fill,
            price_current: mid,
            sl: request.sl,
            tp: request.tp,
            profit: 0.0,
            time: now(),
            magic: request.magic,
            comment: request.comment.clone(),
        });
        debug!(symbol = %request.symbol, ticket, fill, volume = request.volume, "Paper position opened");

        OrderSendResult {
            retcode: retcode::DONE,
            deal,
            order,
            volume: request.volume,
            price: fill,
            bid: mid - self.half_spread(mid),
            ask: mid + self.half_spread(mid),
            comment: "Request executed".into(),
            request_id: order,
            retcode_external: 0,
            request: request.clone(),
        }
    }

    fn close_position(&self, ledger: &mut Ledger, request: &TradeRequest) -> OrderSendResult {
        let Some(idx) = ledger.positions.iter().position(|p| p.ticket == request.position) else {
            return self.result(request, retcode::POSITION_CLOSED, "Position not found");
        };
        let position = ledger.positions[idx].clone();
        if request.order_type != position.order_type.opposite() {
            return self.result(request, retcode::INVALID_ORDER, "Close must be opposite");
        }
        let mid = ledger
            .prices
            .get(&position.symbol)
            .copied()
            .unwrap_or(position.price_current);

        let volume = request.volume.min(position.volume);
        if volume <= 0.0 {
            return self.result(request, retcode::INVALID_VOLUME, "Invalid volume");
        }
        let fill = self.fill_price(request.order_type, mid);
        let realized = profit(position.order_type, volume, position.price_open, fill);
        ledger.balance += realized;

        let remaining = position.volume - volume;
        if remaining <= f64::EPSILON {
            ledger.positions.remove(idx);
        } else {
            ledger.positions[idx].volume = remaining;
        }
        let (order, deal) = self.record_deal(
            ledger,
            request,
            position.ticket,
            DealEntry::Out,
            fill,
            volume,
            realized,
        );
        debug!(
            symbol = %position.symbol,
            ticket = position.ticket,
            fill,
            realized,
            "Paper position closed"
        );

        OrderSendResult {
            retcode: retcode::DONE,
            deal,
            order,
            volume,
            price: fill,
            bid: mid - self.half_spread(mid),
            ask: mid + self.half_spread(mid),
            comment: "Request executed".into(),
            request_id: order,
            retcode_external: 0,
            request: request.clone(),
        }
    }

    fn place_pending(&self, ledger: &mut Ledger, request: &TradeRequest) -> OrderSendResult {
        if matches!(
            request.order_type,
            OrderType::Buy | OrderType::Sell | OrderType::CloseBy
        ) {
            return self.result(request, retcode::INVALID_ORDER, "Not a pending order type");
        }
        if request.volume <= 0.0 {
            return self.result(request, retcode::INVALID_VOLUME, "Invalid volume");
        }
        if request.price <= 0.0 {
            return self.result(request, retcode::INVALID_PRICE, "Invalid price");
        }
        let ticket = ledger.ticket();
        ledger.orders.push(TradeOrder {
            ticket,
            symbol: request.symbol.clone(),
            order_type: request.order_type,
            volume_initial: request.volume,
            volume_current: request.volume,
            price_open: request.price,
            sl: request.sl,
            tp: request.tp,
            time_setup: now(),
            time_done: 0,
            position_id: 0,
            magic: request.magic,
            comment: request.comment.clone(),
        });
        OrderSendResult {
            order: ticket,
            volume: request.volume,
            price: request.price,
            ..self.result(request, retcode::PLACED, "Order placed")
        }
    }

    fn remove_pending(&self, ledger: &mut Ledger, request: &TradeRequest) -> OrderSendResult {
        let Some(idx) = ledger.orders.iter().position(|o| o.ticket == request.order) else {
            return self.result(request, retcode::INVALID_ORDER, "Order not found");
        };
        let mut order = ledger.orders.remove(idx);
        order.time_done = now();
        let ticket = order.ticket;
        ledger.history_orders.push(order);
        OrderSendResult {
            order: ticket,
            ..self.result(request, retcode::DONE, "Order removed")
        }
    }

    fn modify_pending(&self, ledger: &mut Ledger, request: &TradeRequest) -> OrderSendResult {
        let Some(order) = ledger.orders.iter_mut().find(|o| o.ticket == request.order) else {
            return self.result(request, retcode::INVALID_ORDER, "Order not found");
        };
        if request.price > 0.0 {
            order.price_open = request.price;
        }
        order.sl = request.sl;
        order.tp = request.tp;
        let ticket = order.ticket;
        OrderSendResult {
            order: ticket,
            ..self.result(request, retcode::DONE, "Order modified")
        }
    }

    fn modify_sltp(&self, ledger: &mut Ledger, request: &TradeRequest) -> OrderSendResult {
        let Some(position) = ledger
            .positions
            .iter_mut()
            .find(|p| p.ticket == request.position)
        else {
            return self.result(request, retcode::POSITION_CLOSED, "Position not found");
        };
        position.sl = request.sl;
        position.tp = request.tp;
        self.result(request, retcode::DONE, "Position modified")
    }
}

#[async_trait]
impl CandleSource for PaperBroker {
    async fn fetch(&self, symbol: &str, timeframe: TimeFrame, count: usize) -> Result<Candles> {
        let loaded = self
            .series
            .read()
            .await
            .get(&(symbol.to_string(), timeframe))
            .cloned();

        let candles = match (loaded, &self.feed) {
            (Some(bars), _) => Candles::new(bars)?.tail(count),
            (None, Some(feed)) => feed.fetch(symbol, timeframe, count).await?.tail(count),
            (None, None) => {
                return Err(Error::Candles(format!(
                    "no {timeframe} candles loaded for {symbol}"
                )))
            }
        };

        if let Some(last) = candles.last() {
            self.update_price(symbol, last.close).await;
        }
        Ok(candles)
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn symbol_info_tick(&self, symbol: &str) -> Result<Option<Tick>> {
        let ledger = self.ledger.read().await;
        Ok(ledger.prices.get(symbol).map(|&price| {
            let half = self.half_spread(price);
            Tick {
                time: now(),
                bid: price - half,
                ask: price + half,
                last: price,
            }
        }))
    }

    async fn orders_total(&self) -> Result<usize> {
        Ok(self.ledger.read().await.orders.len())
    }

    async fn orders_get(&self, filter: &OrderFilter) -> Result<Option<Vec<TradeOrder>>> {
        let ledger = self.ledger.read().await;
        Ok(Some(
            ledger
                .orders
                .iter()
                .filter(|o| filter.matches(o.ticket, &o.symbol))
                .cloned()
                .collect(),
        ))
    }

    async fn order_check(&self, request: &TradeRequest) -> Result<Option<OrderCheckResult>> {
        let ledger = self.ledger.read().await;
        let price = if request.price > 0.0 {
            Some(request.price)
        } else {
            ledger.prices.get(&request.symbol).copied()
        };

        let equity = ledger.equity();
        let used = self.used_margin(&ledger);
        let closing = request.action == TradeAction::Deal && request.position != 0;
        let required = match price {
            Some(p) if !closing => self.margin(request.volume, p),
            _ => 0.0,
        };

        let (code, comment) = if request.volume <= 0.0 {
            (retcode::INVALID_VOLUME, "Invalid volume")
        } else if price.is_none() {
            (retcode::INVALID_PRICE, "No price")
        } else if required > equity - used {
            (retcode::NO_MONEY, "No money")
        } else {
            (retcode::CHECK_OK, "Done")
        };

        let margin = used + required;
        Ok(Some(OrderCheckResult {
            retcode: code,
            balance: ledger.balance,
            equity,
            profit: ledger.floating_profit(),
            margin,
            margin_free: equity - margin,
            margin_level: if margin > 0.0 { equity / margin * 100.0 } else { 0.0 },
            comment: comment.to_string(),
            request: request.clone(),
        }))
    }

    async fn order_send(&self, request: &TradeRequest) -> Result<Option<OrderSendResult>> {
        let mut ledger = self.ledger.write().await;
        let result = match request.action {
            TradeAction::Deal if request.position != 0 => self.close_position(&mut ledger, request),
            TradeAction::Deal => self.open_position(&mut ledger, request),
            TradeAction::Pending => self.place_pending(&mut ledger, request),
            TradeAction::Remove => self.remove_pending(&mut ledger, request),
            TradeAction::Modify => self.modify_pending(&mut ledger, request),
            TradeAction::Sltp => self.modify_sltp(&mut ledger, request),
            TradeAction::CloseBy => {
                self.result(request, retcode::INVALID, "Close-by is not supported")
            }
        };
        if result.retcode != retcode::DONE && result.retcode != retcode::PLACED {
            warn!(
                symbol = %request.symbol,
                retcode = result.retcode,
                comment = %result.comment,
                "Paper order refused"
            );
        }
        Ok(Some(result))
    }

    async fn order_calc_margin(
        &self,
        _order_type: OrderType,
        _symbol: &str,
        volume: f64,
        price: f64,
    ) -> Result<Option<f64>> {
        Ok(Some(self.margin(volume, price)))
    }

    async fn order_calc_profit(
        &self,
        order_type: OrderType,
        _symbol: &str,
        volume: f64,
        price_open: f64,
        price_close: f64,
    ) -> Result<Option<f64>> {
        Ok(Some(profit(order_type, volume, price_open, price_close)))
    }

    async fn positions_get(&self, filter: &PositionFilter) -> Result<Option<Vec<TradePosition>>> {
        let ledger = self.ledger.read().await;
        Ok(Some(
            ledger
                .positions
                .iter()
                .filter(|p| filter.matches(p.ticket, &p.symbol))
                .map(|p| {
                    let mut p = p.clone();
                    if let Some(&price) = ledger.prices.get(&p.symbol) {
                        p.price_current = price;
                        p.profit = profit(p.order_type, p.volume, p.price_open, price);
                    }
                    p
                })
                .collect(),
        ))
    }

    async fn history_deals_get(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        group: Option<&str>,
    ) -> Result<Option<Vec<TradeDeal>>> {
        let ledger = self.ledger.read().await;
        Ok(Some(
            ledger
                .deals
                .iter()
                .filter(|d| in_range(d.time, from, to) && in_group(&d.symbol, group))
                .cloned()
                .collect(),
        ))
    }

    async fn history_orders_get(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        group: Option<&str>,
    ) -> Result<Option<Vec<TradeOrder>>> {
        let ledger = self.ledger.read().await;
        Ok(Some(
            ledger
                .history_orders
                .iter()
                .filter(|o| in_range(o.time_setup, from, to) && in_group(&o.symbol, group))
                .cloned()
                .collect(),
        ))
    }
}

fn in_range(time: i64, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    from.timestamp() <= time && time <= to.timestamp()
}

fn in_group(symbol: &str, group: Option<&str>) -> bool {
    group.map_or(true, |g| symbol.starts_with(g))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                time: i as i64 * 60,
                open: c,
                high: c,
                low: c,
                close: c,
                tick_volume: 1.0,
            })
            .collect()
    }

    fn market(symbol: &str, order_type: OrderType, volume: f64) -> TradeRequest {
        TradeRequest::new(symbol, volume).order_type(order_type)
    }

    async fn broker_at(price: f64) -> PaperBroker {
        let broker = PaperBroker::new(10_000.0, 0.0, 10.0);
        broker.update_price("BTCUSDT", price).await;
        broker
    }

    #[tokio::test]
    async fn buy_fill_applies_positive_slippage() {
        let broker = PaperBroker::new(10_000.0, 10.0, 100.0);
        broker.update_price("BTCUSDT", 1000.0).await;

        let result = broker
            .order_send(&market("BTCUSDT", OrderType::Buy, 0.01))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.retcode, retcode::DONE);
        let expected = 1000.0 * (1.0 + 10.0 / 10_000.0);
        assert!((result.price - expected).abs() < 1e-9, "fill {}", result.price);
    }

    #[tokio::test]
    async fn sell_fill_applies_negative_slippage_and_spread() {
        let broker = PaperBroker::new(10_000.0, 10.0, 100.0).with_spread_bps(20.0);
        broker.update_price("BTCUSDT", 1000.0).await;

        let tick = broker.symbol_info_tick("BTCUSDT").await.unwrap().unwrap();
        assert!((tick.bid - 999.0).abs() < 1e-9);
        assert!((tick.ask - 1001.0).abs() < 1e-9);

        let result = broker
            .order_send(&market("BTCUSDT", OrderType::Sell, 0.01))
            .await
            .unwrap()
            .unwrap();
        let expected = 999.0 * (1.0 - 10.0 / 10_000.0);
        assert!((result.price - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_symbol_has_no_tick() {
        let broker = PaperBroker::new(1.0, 0.0, 1.0);
        assert_eq!(broker.symbol_info_tick("NOPE").await.unwrap(), None);
    }

    #[tokio::test]
    async fn check_enforces_free_margin() {
        let broker = broker_at(100.0).await;
        // 10x leverage on 10k: up to 1000 units at 100
        let ok = broker
            .order_check(&market("BTCUSDT", OrderType::Buy, 999.0))
            .await
            .unwrap()
            .unwrap();
        assert!(ok.is_ok());
        assert!((ok.margin - 9_990.0).abs() < 1e-6);

        let too_big = broker
            .order_check(&market("BTCUSDT", OrderType::Buy, 1_001.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(too_big.retcode, retcode::NO_MONEY);

        let sent = broker
            .order_send(&market("BTCUSDT", OrderType::Buy, 1_001.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.retcode, retcode::NO_MONEY);
        assert!(broker.positions_get(&PositionFilter::default()).await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn closing_realizes_profit_into_balance() {
        let broker = broker_at(100.0).await;
        broker
            .order_send(&market("BTCUSDT", OrderType::Buy, 2.0))
            .await
            .unwrap();
        let position = broker
            .positions_get(&PositionFilter::symbol("BTCUSDT"))
            .await
            .unwrap()
            .unwrap()
            .remove(0);

        broker.update_price("BTCUSDT", 110.0).await;
        assert!((broker.equity().await - 10_020.0).abs() < 1e-9);
        let open = broker
            .positions_get(&PositionFilter::ticket(position.ticket))
            .await
            .unwrap()
            .unwrap();
        assert!((open[0].profit - 20.0).abs() < 1e-9);

        let close = market("BTCUSDT", OrderType::Sell, 2.0)
            .position(position.ticket)
            .price(110.0);
        let result = broker.order_send(&close).await.unwrap().unwrap();
        assert_eq!(result.retcode, retcode::DONE);
        assert!((broker.balance().await - 10_020.0).abs() < 1e-9);
        assert_eq!(broker.positions_get(&PositionFilter::default()).await.unwrap(), Some(vec![]));

        let again = broker.order_send(&close).await.unwrap().unwrap();
        assert_eq!(again.retcode, retcode::POSITION_CLOSED);
    }

    #[tokio::test]
    async fn short_profits_when_price_falls() {
        let broker = broker_at(100.0).await;
        broker
            .order_send(&market("BTCUSDT", OrderType::Sell, 1.0))
            .await
            .unwrap();
        broker.update_price("BTCUSDT", 90.0).await;
        let ticket = broker.positions_get(&PositionFilter::default()).await.unwrap().unwrap()[0].ticket;

        let close = market("BTCUSDT", OrderType::Buy, 1.0).position(ticket);
        broker.order_send(&close).await.unwrap();
        assert!((broker.balance().await - 10_010.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn pending_orders_are_placed_modified_and_removed() {
        let broker = broker_at(100.0).await;
        let placed = broker
            .order_send(
                &market("BTCUSDT", OrderType::BuyLimit, 1.0)
                    .action(TradeAction::Pending)
                    .price(95.0),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(placed.retcode, retcode::PLACED);
        assert_eq!(broker.orders_total().await.unwrap(), 1);

        let modify = TradeRequest::new("BTCUSDT", 1.0)
            .action(TradeAction::Modify)
            .order(placed.order)
            .price(94.0)
            .sl(90.0);
        assert_eq!(broker.order_send(&modify).await.unwrap().unwrap().retcode, retcode::DONE);
        let orders = broker.orders_get(&OrderFilter::ticket(placed.order)).await.unwrap().unwrap();
        assert_eq!(orders[0].price_open, 94.0);
        assert_eq!(orders[0].sl, 90.0);

        let remove = TradeRequest::new("BTCUSDT", 1.0)
            .action(TradeAction::Remove)
            .order(placed.order);
        assert_eq!(broker.order_send(&remove).await.unwrap().unwrap().retcode, retcode::DONE);
        assert_eq!(broker.orders_total().await.unwrap(), 0);

        let market_as_pending = market("BTCUSDT", OrderType::Buy, 1.0).action(TradeAction::Pending);
        assert_eq!(
            broker.order_send(&market_as_pending).await.unwrap().unwrap().retcode,
            retcode::INVALID_ORDER
        );
    }

    #[tokio::test]
    async fn sltp_modifies_open_position() {
        let broker = broker_at(100.0).await;
        broker
            .order_send(&market("BTCUSDT", OrderType::Buy, 1.0))
            .await
            .unwrap();
        let ticket = broker.positions_get(&PositionFilter::default()).await.unwrap().unwrap()[0].ticket;

        let sltp = TradeRequest::new("BTCUSDT", 1.0)
            .action(TradeAction::Sltp)
            .position(ticket)
            .sl(95.0)
            .tp(120.0);
        broker.order_send(&sltp).await.unwrap();
        let positions = broker.positions_get(&PositionFilter::default()).await.unwrap().unwrap();
        let p = &positions[0];
        assert_eq!((p.sl, p.tp), (95.0, 120.0));
    }

    #[tokio::test]
    async fn deals_are_recorded_in_history() {
        let broker = broker_at(100.0).await;
        broker.update_price("ETHUSDT", 10.0).await;
        broker
            .order_send(&market("BTCUSDT", OrderType::Buy, 1.0))
            .await
            .unwrap();
        broker
            .order_send(&market("ETHUSDT", OrderType::Sell, 1.0))
            .await
            .unwrap();

        let to = Utc::now() + ChronoDuration::minutes(1);
        let from = to - ChronoDuration::hours(1);
        let deals = broker.history_deals_get(from, to, None).await.unwrap().unwrap();
        assert_eq!(deals.len(), 2);
        assert!(deals.iter().all(|d| d.entry == DealEntry::In));

        let btc = broker.history_deals_get(from, to, Some("BTC")).await.unwrap().unwrap();
        assert_eq!(btc.len(), 1);
        let orders = broker.history_orders_get(from, to, Some("ETH")).await.unwrap().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].ticket, deals[1].order);

        let long_ago = broker
            .history_deals_get(from - ChronoDuration::days(2), from - ChronoDuration::days(1), None)
            .await
            .unwrap()
            .unwrap();
        assert!(long_ago.is_empty());
    }

    #[tokio::test]
    async fn fetch_caps_count_and_tracks_price() {
        let broker = PaperBroker::new(1_000.0, 0.0, 1.0);
        broker
            .load_candles("BTCUSDT", TimeFrame::M1, bars(&[1.0, 2.0, 3.0, 4.0]))
            .await
            .unwrap();
        broker.update_price("BTCUSDT", 99.0).await;

        let candles = broker.fetch("BTCUSDT", TimeFrame::M1, 2).await.unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles.closes(), vec![3.0, 4.0]);
        let tick = broker.symbol_info_tick("BTCUSDT").await.unwrap().unwrap();
        assert_eq!(tick.last, 4.0);

        assert!(matches!(
            broker.fetch("BTCUSDT", TimeFrame::H1, 2).await,
            Err(Error::Candles(_))
        ));
    }

    #[tokio::test]
    async fn fetch_falls_back_to_feed() {
        let feed = Arc::new(PaperBroker::new(0.0, 0.0, 1.0));
        feed.load_candles("ETHUSDT", TimeFrame::H1, bars(&[5.0, 6.0]))
            .await
            .unwrap();
        let broker = PaperBroker::new(1_000.0, 0.0, 1.0).with_feed(feed);

        let candles = broker.fetch("ETHUSDT", TimeFrame::H1, 10).await.unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(broker.symbol_info_tick("ETHUSDT").await.unwrap().unwrap().last, 6.0);
    }

    #[tokio::test]
    async fn unordered_candles_are_rejected() {
        let broker = PaperBroker::new(1_000.0, 0.0, 1.0);
        let mut series = bars(&[1.0, 2.0]);
        series.swap(0, 1);
        assert!(broker.load_candles("X", TimeFrame::M1, series).await.is_err());
    }
}
