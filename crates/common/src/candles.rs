use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One OHLC bar. `time` is the bar open time in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: f64,
}

impl Bar {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Ordered bar series as returned by a candle source, newest bar last.
///
/// Indicator output is attached as named columns of the same length as the
/// bar sequence. OHLC fields are never touched after construction.
#[derive(Debug, Clone, Default)]
pub struct Candles {
    bars: Vec<Bar>,
    columns: HashMap<String, Vec<f64>>,
}

impl Candles {
    /// Wrap bars, rejecting series whose times are not strictly increasing.
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        if let Some(w) = bars.windows(2).find(|w| w[1].time <= w[0].time) {
            return Err(Error::Candles(format!(
                "bar times must be strictly increasing, got {} after {}",
                w[1].time, w[0].time
            )));
        }
        Ok(Self {
            bars,
            columns: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Bar counted from the end: `from_end(1)` is the newest bar,
    /// `from_end(2)` the one before it.
    pub fn from_end(&self, n: usize) -> Option<&Bar> {
        self.index_from_end(n).map(|i| &self.bars[i])
    }

    /// Index of the `n`-th bar from the end, see [`Candles::from_end`].
    pub fn index_from_end(&self, n: usize) -> Option<usize> {
        if n == 0 || n > self.bars.len() {
            return None;
        }
        Some(self.bars.len() - n)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.open).collect()
    }

    /// Attach a derived column, replacing any column of the same name.
    pub fn with_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.bars.len() {
            return Err(Error::Indicator(format!(
                "column '{name}' has {} values for {} bars",
                values.len(),
                self.bars.len()
            )));
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Like [`Candles::column`] but a missing column is an indicator error.
    pub fn require_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name)
            .ok_or_else(|| Error::Indicator(format!("missing column '{name}'")))
    }

    /// Keep only the `count` newest bars. Columns are dropped.
    pub fn tail(&self, count: usize) -> Candles {
        let start = self.bars.len().saturating_sub(count);
        Candles {
            bars: self.bars[start..].to_vec(),
            columns: HashMap::new(),
        }
    }
}
