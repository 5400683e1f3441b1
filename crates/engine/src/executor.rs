use std::sync::Arc;

use tracing::{debug, info, warn};

use common::{
    Broker, Error, OrderCheckResult, OrderFilter, OrderSendResult, Result, TradeOrder, TradeRequest,
};

use crate::retry::RetryPolicy;

/// Broker-facing order operations.
///
/// `check` and `send` are the critical path for placing a trade and are
/// retried under the configured [`RetryPolicy`]. Calculations and queries
/// are single attempts that degrade to empty results.
///
/// Every `Broker::order_check` and `Broker::order_send` call in the engine
/// goes through here; [`crate::Positions`] sends its closing deals this way.
#[derive(Clone)]
pub struct OrderExecutor {
    broker: Arc<dyn Broker>,
    retry: RetryPolicy,
}

impl OrderExecutor {
    pub fn new(broker: Arc<dyn Broker>, retry: RetryPolicy) -> Self {
        Self { broker, retry }
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Ask the broker whether funds suffice and the request is executable.
    pub async fn check(&self, request: &TradeRequest) -> Result<OrderCheckResult> {
        self.retry
            .run("order_check", || async {
                self.broker
                    .order_check(request)
                    .await?
                    .ok_or_else(|| Error::OrderCheck {
                        symbol: request.symbol.clone(),
                    })
            })
            .await
    }

    /// Submit the request to the trade server.
    pub async fn send(&self, request: &TradeRequest) -> Result<OrderSendResult> {
        if let Ok(payload) = serde_json::to_string(request) {
            debug!(symbol = %request.symbol, request = %payload, "Sending order");
        }
        let result = self
            .retry
            .run("order_send", || async {
                self.broker
                    .order_send(request)
                    .await?
                    .ok_or_else(|| Error::OrderSend {
                        symbol: request.symbol.clone(),
                    })
            })
            .await?;
        info!(
            symbol = %request.symbol,
            retcode = result.retcode,
            deal = result.deal,
            price = result.price,
            "Order sent"
        );
        Ok(result)
    }

    /// Margin required for the request, or `None` if the broker cannot say.
    pub async fn calc_margin(&self, request: &TradeRequest) -> Option<f64> {
        match self
            .broker
            .order_calc_margin(request.order_type, &request.symbol, request.volume, request.price)
            .await
        {
            Ok(margin) => margin,
            Err(e) => {
                warn!(symbol = %request.symbol, error = %e, "Margin calculation failed");
                None
            }
        }
    }

    /// Profit if the request opened at `price` and closed at `tp`.
    /// Any failure yields zero.
    pub async fn calc_profit(&self, request: &TradeRequest) -> f64 {
        match self
            .broker
            .order_calc_profit(
                request.order_type,
                &request.symbol,
                request.volume,
                request.price,
                request.tp,
            )
            .await
        {
            Ok(Some(profit)) => profit,
            Ok(None) => 0.0,
            Err(e) => {
                warn!(symbol = %request.symbol, error = %e, "Profit calculation failed");
                0.0
            }
        }
    }

    /// Number of active pending orders.
    pub async fn orders_total(&self) -> Result<usize> {
        self.broker.orders_total().await
    }

    /// A pending order by ticket; `None` when no such order exists.
    pub async fn get_order(&self, ticket: u64) -> Result<Option<TradeOrder>> {
        let orders = self.broker.orders_get(&OrderFilter::ticket(ticket)).await?;
        Ok(orders
            .unwrap_or_default()
            .into_iter()
            .find(|o| o.ticket == ticket))
    }

    /// Pending orders matching `filter`; empty when the broker has none.
    pub async fn get_orders(&self, filter: &OrderFilter) -> Result<Vec<TradeOrder>> {
        Ok(self.broker.orders_get(filter).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{order, MockBroker};
    use common::{retcode, OrderType};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn executor(broker: Arc<MockBroker>) -> OrderExecutor {
        OrderExecutor::new(broker, RetryPolicy::new(3, Duration::from_millis(50)))
    }

    fn request() -> TradeRequest {
        TradeRequest::new("BTCUSDT", 0.5)
            .order_type(OrderType::Buy)
            .price(100.0)
            .tp(110.0)
    }

    #[tokio::test(start_paused = true)]
    async fn send_survives_two_null_responses() {
        let broker = Arc::new(MockBroker::default());
        broker.send_nulls.store(2, Ordering::SeqCst);

        let result = executor(broker.clone()).send(&request()).await.unwrap();
        assert_eq!(result.retcode, retcode::DONE);
        assert_eq!(broker.send_calls.load(Ordering::SeqCst), 3);
        assert_eq!(broker.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_exhaustion_is_an_explicit_error() {
        let broker = Arc::new(MockBroker::default());
        broker.send_nulls.store(u32::MAX, Ordering::SeqCst);

        let err = executor(broker.clone()).send(&request()).await.unwrap_err();
        assert!(matches!(err, Error::OrderSend { ref symbol } if symbol == "BTCUSDT"));
        assert_eq!(broker.send_calls.load(Ordering::SeqCst), 3);
        assert!(broker.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn check_survives_two_null_responses() {
        let broker = Arc::new(MockBroker::default());
        broker.check_nulls.store(2, Ordering::SeqCst);

        let result = executor(broker.clone()).check(&request()).await.unwrap();
        assert!(result.is_ok());
        assert_eq!(result.request.symbol, "BTCUSDT");
        assert_eq!(broker.check_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn check_retries_then_reports_failure() {
        let broker = Arc::new(MockBroker::default());
        broker.check_nulls.store(u32::MAX, Ordering::SeqCst);

        let err = executor(broker.clone()).check(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "Order check failed for BTCUSDT");
        assert_eq!(broker.check_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn calculations_degrade_instead_of_failing() {
        let ok = executor(Arc::new(MockBroker::default()));
        assert_eq!(ok.calc_margin(&request()).await, Some(0.5));
        assert!((ok.calc_profit(&request()).await - 5.0).abs() < 1e-9);

        let broken = executor(Arc::new(MockBroker {
            fail_calcs: true,
            ..Default::default()
        }));
        assert_eq!(broken.calc_margin(&request()).await, None);
        assert_eq!(broken.calc_profit(&request()).await, 0.0);
    }

    #[tokio::test]
    async fn order_queries() {
        let broker = Arc::new(MockBroker::default());
        let exec = executor(broker.clone());
        assert!(exec.get_orders(&OrderFilter::default()).await.unwrap().is_empty());
        assert_eq!(exec.get_order(7).await.unwrap(), None);

        broker.orders.lock().unwrap().extend([
            order(7, "BTCUSDT", 0, 1),
            order(8, "ETHUSDT", 0, 2),
        ]);
        assert_eq!(exec.orders_total().await.unwrap(), 2);
        assert_eq!(exec.get_order(8).await.unwrap().map(|o| o.symbol), Some("ETHUSDT".into()));
        assert_eq!(exec.get_order(9).await.unwrap(), None);
        let btc = exec.get_orders(&OrderFilter::symbol("BTCUSDT")).await.unwrap();
        assert_eq!(btc.len(), 1);
        assert_eq!(btc[0].ticket, 7);
    }
}
