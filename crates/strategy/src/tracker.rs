use std::time::Duration;

use common::{OrderType, Trend};

/// Per-strategy state carried across polling cycles.
///
/// Owned by exactly one strategy instance; all mutation goes through
/// [`Tracker::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct Tracker {
    trend: Trend,
    trend_time: i64,
    entry_time: i64,
    new: bool,
    order_type: Option<OrderType>,
    snooze: Duration,
    last_trend_price: f64,
    last_entry_price: f64,
    sl: f64,
    tp: f64,
}

/// Partial update for a [`Tracker`]. Fields left unset keep their value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerUpdate {
    trend: Option<Trend>,
    trend_time: Option<i64>,
    entry_time: Option<i64>,
    new: Option<bool>,
    order_type: Option<Option<OrderType>>,
    snooze: Option<Duration>,
    last_trend_price: Option<f64>,
    last_entry_price: Option<f64>,
    sl: Option<f64>,
    tp: Option<f64>,
}

impl TrackerUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trend(mut self, trend: Trend) -> Self {
        self.trend = Some(trend);
        self
    }

    pub fn trend_time(mut self, time: i64) -> Self {
        self.trend_time = Some(time);
        self
    }

    pub fn entry_time(mut self, time: i64) -> Self {
        self.entry_time = Some(time);
        self
    }

    pub fn new_bar(mut self, new: bool) -> Self {
        self.new = Some(new);
        self
    }

    pub fn order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(Some(order_type));
        self
    }

    pub fn clear_order(mut self) -> Self {
        self.order_type = Some(None);
        self
    }

    pub fn snooze(mut self, snooze: Duration) -> Self {
        self.snooze = Some(snooze);
        self
    }

    pub fn last_trend_price(mut self, price: f64) -> Self {
        self.last_trend_price = Some(price);
        self
    }

    pub fn last_entry_price(mut self, price: f64) -> Self {
        self.last_entry_price = Some(price);
        self
    }

    pub fn sl(mut self, sl: f64) -> Self {
        self.sl = Some(sl);
        self
    }

    pub fn tp(mut self, tp: f64) -> Self {
        self.tp = Some(tp);
        self
    }
}

impl Tracker {
    /// Fresh tracker: no trend, no bars seen, sleeping `snooze` between polls.
    pub fn new(snooze: Duration) -> Self {
        Self {
            trend: Trend::Unset,
            trend_time: 0,
            entry_time: 0,
            new: true,
            order_type: None,
            snooze,
            last_trend_price: 0.0,
            last_entry_price: 0.0,
            sl: 0.0,
            tp: 0.0,
        }
    }

    /// Merge the present fields of `update` into the current state.
    pub fn update(&mut self, update: TrackerUpdate) {
        let TrackerUpdate {
            trend,
            trend_time,
            entry_time,
            new,
            order_type,
            snooze,
            last_trend_price,
            last_entry_price,
            sl,
            tp,
        } = update;

        if let Some(v) = trend {
            self.trend = v;
        }
        if let Some(v) = trend_time {
            self.trend_time = v;
        }
        if let Some(v) = entry_time {
            self.entry_time = v;
        }
        if let Some(v) = new {
            self.new = v;
        }
        if let Some(v) = order_type {
            self.order_type = v;
        }
        if let Some(v) = snooze {
            self.snooze = v;
        }
        if let Some(v) = last_trend_price {
            self.last_trend_price = v;
        }
        if let Some(v) = last_entry_price {
            self.last_entry_price = v;
        }
        if let Some(v) = sl {
            self.sl = v;
        }
        if let Some(v) = tp {
            self.tp = v;
        }
    }

    pub fn trend(&self) -> Trend {
        self.trend
    }

    pub fn bullish(&self) -> bool {
        self.trend == Trend::Bullish
    }

    pub fn bearish(&self) -> bool {
        self.trend == Trend::Bearish
    }

    pub fn ranging(&self) -> bool {
        self.trend == Trend::Ranging
    }

    pub fn trend_time(&self) -> i64 {
        self.trend_time
    }

    pub fn entry_time(&self) -> i64 {
        self.entry_time
    }

    pub fn is_new(&self) -> bool {
        self.new
    }

    pub fn order_type(&self) -> Option<OrderType> {
        self.order_type
    }

    pub fn snooze(&self) -> Duration {
        self.snooze
    }

    pub fn last_trend_price(&self) -> f64 {
        self.last_trend_price
    }

    pub fn last_entry_price(&self) -> f64 {
        self.last_entry_price
    }

    pub fn sl(&self) -> f64 {
        self.sl
    }

    pub fn tp(&self) -> f64 {
        self.tp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_merges_only_present_fields() {
        let mut tracker = Tracker::new(Duration::from_secs(3600));
        tracker.update(TrackerUpdate::new().trend(Trend::Bullish).trend_time(100));
        tracker.update(TrackerUpdate::new().order_type(OrderType::Buy));

        assert!(tracker.bullish());
        assert_eq!(tracker.trend_time(), 100);
        assert_eq!(tracker.order_type(), Some(OrderType::Buy));
        assert_eq!(tracker.snooze(), Duration::from_secs(3600));
        assert_eq!(tracker.entry_time(), 0);
    }

    #[test]
    fn clear_order_differs_from_leaving_it_alone() {
        let mut tracker = Tracker::new(Duration::from_secs(60));
        tracker.update(TrackerUpdate::new().order_type(OrderType::Sell));

        tracker.update(TrackerUpdate::new().snooze(Duration::from_secs(5)));
        assert_eq!(tracker.order_type(), Some(OrderType::Sell));

        tracker.update(TrackerUpdate::new().clear_order());
        assert_eq!(tracker.order_type(), None);
    }

    #[test]
    fn empty_update_is_a_no_op() {
        let mut tracker = Tracker::new(Duration::from_secs(60));
        tracker.update(TrackerUpdate::new().trend(Trend::Bearish).sl(1.5).tp(2.5));
        let before = tracker.clone();
        tracker.update(TrackerUpdate::new());
        assert_eq!(tracker, before);
    }

    #[test]
    fn trend_accessors_are_exclusive() {
        let mut tracker = Tracker::new(Duration::from_secs(60));
        assert!(!tracker.bullish() && !tracker.bearish() && !tracker.ranging());
        tracker.update(TrackerUpdate::new().trend(Trend::Ranging));
        assert!(tracker.ranging() && !tracker.bullish() && !tracker.bearish());
    }
}
