use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, warn};

use common::{
    retcode, Broker, Error, OrderSendResult, OrderType, PositionFilter, Result, TradeAction,
    TradePosition, TradeRequest,
};

use crate::executor::OrderExecutor;
use crate::retry::RetryPolicy;

/// Open-position queries and closing. Closing deals go out through
/// [`OrderExecutor::send`].
#[derive(Clone)]
pub struct Positions {
    executor: OrderExecutor,
}

impl Positions {
    pub fn new(broker: Arc<dyn Broker>, retry: RetryPolicy) -> Self {
        Self {
            executor: OrderExecutor::new(broker, retry),
        }
    }

    /// All open positions. A null answer after retries is treated as none;
    /// transport failures are returned.
    pub async fn get_positions(&self) -> Result<Vec<TradePosition>> {
        self.get(&PositionFilter::default()).await
    }

    pub async fn get_position_by_ticket(&self, ticket: u64) -> Result<Option<TradePosition>> {
        Ok(self
            .get(&PositionFilter::ticket(ticket))
            .await?
            .into_iter()
            .find(|p| p.ticket == ticket))
    }

    pub async fn get_positions_by_symbol(&self, symbol: &str) -> Result<Vec<TradePosition>> {
        self.get(&PositionFilter::symbol(symbol)).await
    }

    async fn get(&self, filter: &PositionFilter) -> Result<Vec<TradePosition>> {
        let broker = self.executor.broker();
        let positions = self
            .executor
            .retry_policy()
            .run("positions_get", || async {
                broker
                    .positions_get(filter)
                    .await?
                    .ok_or(Error::NoResponse("positions_get"))
            })
            .await;

        match positions {
            Ok(p) => Ok(p),
            Err(Error::NoResponse(call)) => {
                warn!(filter = ?filter, call, "No positions returned");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Close `position` with an opposite market deal at the current quote.
    pub async fn close_position(&self, position: &TradePosition) -> Result<OrderSendResult> {
        let tick = self
            .executor
            .broker()
            .symbol_info_tick(&position.symbol)
            .await?
            .ok_or_else(|| Error::Broker(format!("no tick for {}", position.symbol)))?;

        let order_type = position.order_type.opposite();
        let price = if order_type == OrderType::Sell {
            tick.bid
        } else {
            tick.ask
        };
        let request = TradeRequest::new(position.symbol.clone(), position.volume)
            .action(TradeAction::Deal)
            .order_type(order_type)
            .price(price)
            .position(position.ticket)
            .magic(position.magic)
            .comment(format!("close #{}", position.ticket));

        let result = self.executor.send(&request).await?;
        info!(
            ticket = position.ticket,
            symbol = %position.symbol,
            retcode = result.retcode,
            price = result.price,
            "Position close sent"
        );
        Ok(result)
    }

    /// Close by ticket. `None` when no such position is open.
    pub async fn close_position_by_ticket(&self, ticket: u64) -> Result<Option<OrderSendResult>> {
        match self.get_position_by_ticket(ticket).await? {
            Some(position) => self.close_position(&position).await.map(Some),
            None => Ok(None),
        }
    }

    /// Close every open position concurrently. Returns how many closed with
    /// `DONE`.
    pub async fn close_all(&self) -> Result<usize> {
        let positions = self.get_positions().await?;
        let mut set = JoinSet::new();
        for position in positions {
            let this = self.clone();
            set.spawn(async move { this.close_position(&position).await });
        }

        let mut closed = 0;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(result)) if result.retcode == retcode::DONE => closed += 1,
                Ok(Ok(result)) => {
                    warn!(retcode = result.retcode, comment = %result.comment, "Close rejected")
                }
                Ok(Err(e)) => warn!(error = %e, "Close failed"),
                Err(e) => warn!(error = %e, "Close task panicked"),
            }
        }
        info!(closed, "Closed open positions");
        Ok(closed)
    }
}
