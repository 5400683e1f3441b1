use tracing::{info, warn};

use common::{Error, OrderSendResult, OrderType, Result, TradeRequest};
use strategy::StrategyConfig;

use crate::executor::OrderExecutor;

/// Sizing and protection settings for the market orders a trader places.
#[derive(Debug, Clone, PartialEq)]
pub struct TraderParams {
    pub volume: f64,
    /// Stop-loss distance as a fraction of the entry price.
    pub stop_loss_pct: Option<f64>,
    /// Take-profit distance as a multiple of the stop-loss distance.
    pub risk_to_reward: f64,
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
}

impl TraderParams {
    pub fn new(volume: f64) -> Self {
        Self {
            volume,
            stop_loss_pct: None,
            risk_to_reward: 2.0,
            deviation: 0,
            magic: 0,
            comment: String::new(),
        }
    }

    pub fn from_config(cfg: &StrategyConfig) -> Self {
        Self {
            volume: cfg.volume,
            stop_loss_pct: cfg.stop_loss_pct,
            risk_to_reward: cfg.risk_to_reward,
            deviation: cfg.deviation,
            magic: cfg.magic,
            comment: cfg.name.clone(),
        }
    }
}

/// What became of a placement attempt that reached the broker.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    Filled(OrderSendResult),
    Rejected { retcode: u32, comment: String },
}

impl TradeOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, TradeOutcome::Filled(_))
    }
}

/// Places one market order per confirmed entry.
#[derive(Clone)]
pub struct SimpleTrader {
    executor: OrderExecutor,
    params: TraderParams,
}

impl SimpleTrader {
    pub fn new(executor: OrderExecutor, params: TraderParams) -> Self {
        Self { executor, params }
    }

    pub fn params(&self) -> &TraderParams {
        &self.params
    }

    /// Build the request for `order_type` at the current quote.
    pub async fn create_request(&self, symbol: &str, order_type: OrderType) -> Result<TradeRequest> {
        let tick = self
            .executor
            .broker()
            .symbol_info_tick(symbol)
            .await?
            .ok_or_else(|| Error::Broker(format!("no tick for {symbol}")))?;

        let price = match order_type {
            OrderType::Buy => tick.ask,
            OrderType::Sell => tick.bid,
            other => {
                return Err(Error::Other(format!(
                    "market trader cannot place {other} orders"
                )))
            }
        };

        let mut request = TradeRequest::new(symbol, self.params.volume)
            .order_type(order_type)
            .price(price)
            .deviation(self.params.deviation)
            .magic(self.params.magic)
            .comment(self.params.comment.clone());

        if let Some(pct) = self.params.stop_loss_pct.filter(|p| *p > 0.0) {
            let sl_dist = price * pct;
            let tp_dist = sl_dist * self.params.risk_to_reward;
            request = if order_type == OrderType::Buy {
                request.sl(price - sl_dist).tp(price + tp_dist)
            } else {
                request.sl(price + sl_dist).tp(price - tp_dist)
            };
        }
        Ok(request)
    }

    /// Check then send a market order. Broker refusals are outcomes, not
    /// errors; exhausted retries and missing quotes are errors.
    pub async fn place_trade(&self, symbol: &str, order_type: OrderType) -> Result<TradeOutcome> {
        let request = self.create_request(symbol, order_type).await?;

        let check = self.executor.check(&request).await?;
        if !check.is_ok() {
            warn!(
                symbol,
                order_type = %order_type,
                retcode = check.retcode,
                comment = %check.comment,
                "Order check rejected"
            );
            return Ok(TradeOutcome::Rejected {
                retcode: check.retcode,
                comment: check.comment,
            });
        }

        let result = self.executor.send(&request).await?;
        if !result.is_success() {
            warn!(
                symbol,
                order_type = %order_type,
                retcode = result.retcode,
                comment = %result.comment,
                "Order rejected"
            );
            return Ok(TradeOutcome::Rejected {
                retcode: result.retcode,
                comment: result.comment,
            });
        }

        info!(
            symbol,
            order_type = %order_type,
            volume = request.volume,
            price = result.price,
            sl = request.sl,
            tp = request.tp,
            "Trade placed"
        );
        Ok(TradeOutcome::Filled(result))
    }
}
