use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use common::{Broker, Error, Result, TradeDeal, TradeOrder};

use crate::retry::RetryPolicy;

/// Snapshot of executed deals and finished orders over a date range.
#[derive(Debug, Clone, Default)]
pub struct History {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub group: Option<String>,
    pub deals: Vec<TradeDeal>,
    pub orders: Vec<TradeOrder>,
}

impl History {
    /// Fetch deals and orders in `[from, to]` concurrently. A side that
    /// cannot be fetched is left empty.
    pub async fn load(
        broker: Arc<dyn Broker>,
        retry: RetryPolicy,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        group: Option<&str>,
    ) -> Self {
        let deals = retry.run("history_deals_get", || async {
            broker
                .history_deals_get(from, to, group)
                .await?
                .ok_or_else(|| Error::NoResponse("history_deals_get"))
        });
        let orders = retry.run("history_orders_get", || async {
            broker
                .history_orders_get(from, to, group)
                .await?
                .ok_or_else(|| Error::NoResponse("history_orders_get"))
        });
        let (deals, orders) = tokio::join!(deals, orders);

        let history = Self {
            from: Some(from),
            to: Some(to),
            group: group.map(str::to_string),
            deals: or_empty(deals, "deals"),
            orders: or_empty(orders, "orders"),
        };
        debug!(
            deals = history.deals.len(),
            orders = history.orders.len(),
            "History loaded"
        );
        history
    }

    pub fn total_deals(&self) -> usize {
        self.deals.len()
    }

    pub fn total_orders(&self) -> usize {
        self.orders.len()
    }

    /// Deals created by the order `ticket`, oldest first.
    pub fn deals_by_ticket(&self, ticket: u64) -> Vec<TradeDeal> {
        sorted_deals(self.deals.iter().filter(|d| d.order == ticket))
    }

    pub fn deals_by_position(&self, position: u64) -> Vec<TradeDeal> {
        sorted_deals(self.deals.iter().filter(|d| d.position_id == position))
    }

    pub fn orders_by_ticket(&self, ticket: u64) -> Vec<TradeOrder> {
        sorted_orders(self.orders.iter().filter(|o| o.ticket == ticket))
    }

    pub fn orders_by_position(&self, position: u64) -> Vec<TradeOrder> {
        sorted_orders(self.orders.iter().filter(|o| o.position_id == position))
    }
}

fn or_empty<T>(fetched: Result<Vec<T>>, what: &str) -> Vec<T> {
    fetched.unwrap_or_else(|e| {
        warn!(error = %e, "Could not load history {what}");
        Vec::new()
    })
}

fn sorted_deals<'a>(deals: impl Iterator<Item = &'a TradeDeal>) -> Vec<TradeDeal> {
    let mut out: Vec<_> = deals.cloned().collect();
    out.sort_by_key(|d| d.time);
    out
}

fn sorted_orders<'a>(orders: impl Iterator<Item = &'a TradeOrder>) -> Vec<TradeOrder> {
    let mut out: Vec<_> = orders.cloned().collect();
    out.sort_by_key(|o| o.time_setup);
    out
}
