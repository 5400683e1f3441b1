use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use proptest::prelude::*;

use common::{Bar, CandleSource, Candles, Error, OrderType, Result, TimeFrame};
use strategy::{FingerTrap, FingerTrapParams, StageResult, Strategy as TradingStrategy};

#[derive(Default)]
struct ScriptedSource {
    series: Mutex<HashMap<TimeFrame, Vec<Bar>>>,
}

impl ScriptedSource {
    fn set(&self, tf: TimeFrame, bars: Vec<Bar>) {
        self.series.lock().unwrap().insert(tf, bars);
    }
}

#[async_trait]
impl CandleSource for ScriptedSource {
    async fn fetch(&self, _symbol: &str, tf: TimeFrame, count: usize) -> Result<Candles> {
        let bars = self
            .series
            .lock()
            .unwrap()
            .get(&tf)
            .cloned()
            .ok_or_else(|| Error::Candles(format!("no data for {tf}")))?;
        Ok(Candles::new(bars)?.tail(count))
    }
}

fn to_bars(prices: &[(f64, f64)], tf: TimeFrame, start: i64) -> Vec<Bar> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &(open, close))| Bar {
            time: start + i as i64 * tf.seconds() as i64,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            tick_volume: 1.0,
        })
        .collect()
}

fn price_pairs(min: usize, max: usize) -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((1.0f64..1_000.0, 1.0f64..1_000.0), min..max)
}

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Runtime::new().unwrap().block_on(f)
}

proptest! {
    /// Whatever the market does, the emitted order never contradicts the
    /// trend, ranging never carries an order, and the snooze matches the
    /// outcome.
    #[test]
    fn decisions_are_consistent_with_trend(
        trend in price_pairs(2, 80),
        entry in price_pairs(2, 80),
    ) {
        let source = Arc::new(ScriptedSource::default());
        source.set(TimeFrame::H1, to_bars(&trend, TimeFrame::H1, 1_000_000));
        source.set(TimeFrame::M5, to_bars(&entry, TimeFrame::M5, 1_000_000));
        let mut ft = FingerTrap::new("prop", "TEST", FingerTrapParams::default(), source);

        let decision = block_on(TradingStrategy::watch_market(&mut ft));
        let tracker = ft.tracker();

        match decision.order_type {
            Some(OrderType::Buy) => prop_assert!(tracker.bullish()),
            Some(OrderType::Sell) => prop_assert!(tracker.bearish()),
            Some(other) => prop_assert!(false, "unexpected order type {other}"),
            None => {}
        }
        if tracker.ranging() {
            prop_assert_eq!(decision.order_type, None);
            prop_assert_eq!(decision.snooze, TimeFrame::H1.interval());
        } else if decision.order_type.is_none() {
            prop_assert_eq!(decision.snooze, TimeFrame::M5.interval());
        } else {
            prop_assert_eq!(decision.snooze, TimeFrame::H1.interval());
        }
    }

    /// Re-fetching an older series is a no-op apart from the `new` flag and
    /// the cleared order.
    #[test]
    fn stale_trend_fetch_is_idempotent(
        first in price_pairs(2, 60),
        older in price_pairs(2, 60),
        shift in 1i64..1_000_000,
        repeats in 1usize..4,
    ) {
        let source = Arc::new(ScriptedSource::default());
        source.set(TimeFrame::H1, to_bars(&first, TimeFrame::H1, 10_000_000));
        let mut ft = FingerTrap::new("prop", "TEST", FingerTrapParams::default(), source.clone());
        block_on(ft.check_trend());
        let before = ft.tracker().clone();

        // newest bar strictly older than anything seen
        let newest_first = before.trend_time();
        let start = newest_first - shift - (older.len() as i64 - 1) * 3600;
        source.set(TimeFrame::H1, to_bars(&older, TimeFrame::H1, start));

        for _ in 0..repeats {
            prop_assert_eq!(block_on(ft.check_trend()), StageResult::Stale);
            let after = ft.tracker();
            prop_assert!(!after.is_new());
            prop_assert_eq!(after.order_type(), None);
            prop_assert_eq!(after.trend(), before.trend());
            prop_assert_eq!(after.trend_time(), before.trend_time());
            prop_assert_eq!(after.snooze(), before.snooze());
            prop_assert_eq!(after.last_trend_price(), before.last_trend_price());
        }
    }
}
