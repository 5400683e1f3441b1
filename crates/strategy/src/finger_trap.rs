use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use common::{CandleSource, Candles, Error, OrderType, Result, TimeFrame, Trend};

use crate::indicators::{above, below, cross, ema, fill_na};
use crate::tracker::{Tracker, TrackerUpdate};
use crate::{Decision, Stage, StageResult, Strategy};

/// FingerTrap parameters. Defaults: 8/20 EMA trend on H1 over 50 bars,
/// 5 EMA entry on M5 over 600 bars.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerTrapParams {
    /// Trend (slow) timeframe.
    pub ttf: TimeFrame,
    /// Entry (fast) timeframe.
    pub etf: TimeFrame,
    pub fast_ema: usize,
    pub slow_ema: usize,
    pub entry_ema: usize,
    /// Trend candle count.
    pub tcc: usize,
    /// Entry candle count.
    pub ecc: usize,
}

impl Default for FingerTrapParams {
    fn default() -> Self {
        Self {
            ttf: TimeFrame::H1,
            etf: TimeFrame::M5,
            fast_ema: 8,
            slow_ema: 20,
            entry_ema: 5,
            tcc: 50,
            ecc: 600,
        }
    }
}

/// Two-stage trend follower.
///
/// The trend stage classifies the slow timeframe with a fast/slow EMA pair on
/// the last closed bar. While trending, the confirmation stage waits for price
/// to cross the entry EMA on the fast timeframe in the trend's direction.
pub struct FingerTrap {
    name: String,
    symbol: String,
    params: FingerTrapParams,
    source: Arc<dyn CandleSource>,
    tracker: Tracker,
}

impl FingerTrap {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        params: FingerTrapParams,
        source: Arc<dyn CandleSource>,
    ) -> Self {
        let tracker = Tracker::new(params.ttf.interval());
        Self {
            name: name.into(),
            symbol: symbol.into(),
            params,
            source,
            tracker,
        }
    }

    pub fn params(&self) -> &FingerTrapParams {
        &self.params
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Classify the trend on the slow timeframe.
    pub async fn check_trend(&mut self) -> StageResult {
        match self.try_check_trend().await {
            Ok(result) => result,
            Err(e) => {
                self.log_failure(Stage::CheckTrend, &e);
                self.tracker.update(
                    TrackerUpdate::new()
                        .snooze(self.params.ttf.interval())
                        .clear_order(),
                );
                StageResult::Degraded(e.to_string())
            }
        }
    }

    /// Look for an entry in the trend's direction on the fast timeframe.
    pub async fn confirm_trend(&mut self) -> StageResult {
        match self.try_confirm_trend().await {
            Ok(result) => result,
            Err(e) => {
                self.log_failure(Stage::ConfirmTrend, &e);
                self.tracker.update(
                    TrackerUpdate::new()
                        .snooze(self.params.etf.interval())
                        .clear_order(),
                );
                StageResult::Degraded(e.to_string())
            }
        }
    }

    async fn try_check_trend(&mut self) -> Result<StageResult> {
        let p = &self.params;
        let mut candles = self.source.fetch(&self.symbol, p.ttf, p.tcc).await?;
        let current = newest_time(&candles)?;
        if current < self.tracker.trend_time() {
            self.tracker
                .update(TrackerUpdate::new().new_bar(false).clear_order());
            return Ok(StageResult::Stale);
        }
        self.tracker
            .update(TrackerUpdate::new().new_bar(true).trend_time(current));

        // The newest bar may still be forming; judge the last closed one.
        let i = closed_index(&candles)?;
        let closes = candles.closes();
        candles.with_column("fast", fill_na(ema(&closes, p.fast_ema), 0.0))?;
        candles.with_column("slow", fill_na(ema(&closes, p.slow_ema), 0.0))?;
        let fast = candles.require_column("fast")?;
        let slow = candles.require_column("slow")?;

        let fast_above_slow = above(fast, slow);
        let fast_below_slow = below(fast, slow);
        let close_above_fast = above(&closes, fast);
        let close_below_fast = below(&closes, fast);
        let bar = candles.bars()[i];

        let update = if fast_above_slow[i] && close_above_fast[i] && bar.is_bullish() {
            TrackerUpdate::new().trend(Trend::Bullish)
        } else if fast_below_slow[i] && close_below_fast[i] && bar.is_bearish() {
            TrackerUpdate::new().trend(Trend::Bearish)
        } else {
            TrackerUpdate::new()
                .trend(Trend::Ranging)
                .snooze(p.ttf.interval())
                .clear_order()
        };
        self.tracker.update(update.last_trend_price(bar.close));

        debug!(
            symbol = %self.symbol,
            strategy = %self.name,
            trend = %self.tracker.trend(),
            bar_time = bar.time,
            fast = fast[i],
            slow = slow[i],
            "Trend evaluated"
        );
        Ok(StageResult::Fresh)
    }

    async fn try_confirm_trend(&mut self) -> Result<StageResult> {
        let p = &self.params;
        let mut candles = self.source.fetch(&self.symbol, p.etf, p.ecc).await?;
        let current = newest_time(&candles)?;
        if current < self.tracker.entry_time() {
            self.tracker
                .update(TrackerUpdate::new().new_bar(false).clear_order());
            return Ok(StageResult::Stale);
        }
        self.tracker
            .update(TrackerUpdate::new().new_bar(true).entry_time(current));

        let prev = closed_index(&candles)?;
        let last = prev + 1;
        let closes = candles.closes();
        candles.with_column("ema", ema(&closes, p.entry_ema))?;
        let line = candles.require_column("ema")?;

        // A cross on the previous bar still counts, in case it was seen late.
        let crossed_above = cross(&closes, line, true);
        let crossed_below = cross(&closes, line, false);
        let up = crossed_above[last] || crossed_above[prev];
        let down = crossed_below[last] || crossed_below[prev];

        let update = if self.tracker.bullish() && up {
            TrackerUpdate::new()
                .order_type(OrderType::Buy)
                .snooze(p.ttf.interval())
        } else if self.tracker.bearish() && down {
            TrackerUpdate::new()
                .order_type(OrderType::Sell)
                .snooze(p.ttf.interval())
        } else {
            TrackerUpdate::new().clear_order().snooze(p.etf.interval())
        };
        self.tracker.update(update.last_entry_price(closes[last]));

        debug!(
            symbol = %self.symbol,
            strategy = %self.name,
            trend = %self.tracker.trend(),
            order = ?self.tracker.order_type(),
            "Entry evaluated"
        );
        Ok(StageResult::Fresh)
    }

    fn decision(&self) -> Decision {
        Decision {
            new: self.tracker.is_new(),
            order_type: self.tracker.order_type(),
            snooze: self.tracker.snooze(),
        }
    }

    fn log_failure(&self, stage: Stage, e: &Error) {
        error!(
            symbol = %self.symbol,
            strategy = %self.name,
            stage = %stage,
            error = %e,
            "Stage failed, treating cycle as no signal"
        );
    }
}

#[async_trait]
impl Strategy for FingerTrap {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn base_interval(&self) -> Duration {
        self.params.ttf.interval()
    }

    async fn watch_market(&mut self) -> Decision {
        let trend = self.check_trend().await;
        if !trend.is_degraded() && self.tracker.trend().is_directional() {
            self.confirm_trend().await;
        }
        self.decision()
    }
}

fn newest_time(candles: &Candles) -> Result<i64> {
    candles
        .last()
        .map(|b| b.time)
        .ok_or_else(|| Error::Candles("candle source returned no bars".into()))
}

/// Index of the last closed bar (second from the end).
fn closed_index(candles: &Candles) -> Result<usize> {
    candles.index_from_end(2).ok_or_else(|| {
        Error::Candles(format!("need at least 2 bars, got {}", candles.len()))
    })
}
