use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Candle timeframe. Variant names follow the usual terminal notation
/// (`M5` = five minutes, `H1` = one hour, `MN1` = one month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    M1,
    M2,
    M3,
    M4,
    M5,
    M6,
    M10,
    M12,
    M15,
    M20,
    M30,
    H1,
    H2,
    H3,
    H4,
    H6,
    H8,
    H12,
    D1,
    W1,
    MN1,
}

impl TimeFrame {
    /// Length of one bar in seconds. Months are counted as 30 days.
    pub fn seconds(&self) -> u64 {
        match self {
            TimeFrame::M1 => 60,
            TimeFrame::M2 => 120,
            TimeFrame::M3 => 180,
            TimeFrame::M4 => 240,
            TimeFrame::M5 => 300,
            TimeFrame::M6 => 360,
            TimeFrame::M10 => 600,
            TimeFrame::M12 => 720,
            TimeFrame::M15 => 900,
            TimeFrame::M20 => 1_200,
            TimeFrame::M30 => 1_800,
            TimeFrame::H1 => 3_600,
            TimeFrame::H2 => 7_200,
            TimeFrame::H3 => 10_800,
            TimeFrame::H4 => 14_400,
            TimeFrame::H6 => 21_600,
            TimeFrame::H8 => 28_800,
            TimeFrame::H12 => 43_200,
            TimeFrame::D1 => 86_400,
            TimeFrame::W1 => 604_800,
            TimeFrame::MN1 => 2_592_000,
        }
    }

    /// Bar interval as a sleepable duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.seconds())
    }

    /// Kline interval string used by Binance, if the exchange offers it.
    pub fn binance_interval(&self) -> Option<&'static str> {
        match self {
            TimeFrame::M1 => Some("1m"),
            TimeFrame::M3 => Some("3m"),
            TimeFrame::M5 => Some("5m"),
            TimeFrame::M15 => Some("15m"),
            TimeFrame::M30 => Some("30m"),
            TimeFrame::H1 => Some("1h"),
            TimeFrame::H2 => Some("2h"),
            TimeFrame::H4 => Some("4h"),
            TimeFrame::H6 => Some("6h"),
            TimeFrame::H8 => Some("8h"),
            TimeFrame::H12 => Some("12h"),
            TimeFrame::D1 => Some("1d"),
            TimeFrame::W1 => Some("1w"),
            TimeFrame::MN1 => Some("1M"),
            _ => None,
        }
    }

    const ALL: [TimeFrame; 21] = [
        TimeFrame::M1,
        TimeFrame::M2,
        TimeFrame::M3,
        TimeFrame::M4,
        TimeFrame::M5,
        TimeFrame::M6,
        TimeFrame::M10,
        TimeFrame::M12,
        TimeFrame::M15,
        TimeFrame::M20,
        TimeFrame::M30,
        TimeFrame::H1,
        TimeFrame::H2,
        TimeFrame::H3,
        TimeFrame::H4,
        TimeFrame::H6,
        TimeFrame::H8,
        TimeFrame::H12,
        TimeFrame::D1,
        TimeFrame::W1,
        TimeFrame::MN1,
    ];
}

impl std::fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl FromStr for TimeFrame {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        TimeFrame::ALL
            .iter()
            .copied()
            .find(|tf| tf.to_string() == wanted)
            .ok_or_else(|| Error::Config(format!("unknown timeframe '{s}'")))
    }
}

/// Trend classification maintained by the trend stage of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Ranging,
    #[default]
    Unset,
}

impl Trend {
    /// True for bullish and bearish, the only trends an entry can follow.
    pub fn is_directional(&self) -> bool {
        matches!(self, Trend::Bullish | Trend::Bearish)
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Bullish => write!(f, "bullish"),
            Trend::Bearish => write!(f, "bearish"),
            Trend::Ranging => write!(f, "ranging"),
            Trend::Unset => write!(f, "unset"),
        }
    }
}

/// Order type as understood by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Buy,
    Sell,
    BuyLimit,
    SellLimit,
    BuyStop,
    SellStop,
    BuyStopLimit,
    SellStopLimit,
    CloseBy,
}

impl OrderType {
    /// The order type that would close or offset this one.
    pub fn opposite(&self) -> OrderType {
        match self {
            OrderType::Buy => OrderType::Sell,
            OrderType::Sell => OrderType::Buy,
            OrderType::BuyLimit => OrderType::SellLimit,
            OrderType::SellLimit => OrderType::BuyLimit,
            OrderType::BuyStop => OrderType::SellStop,
            OrderType::SellStop => OrderType::BuyStop,
            OrderType::BuyStopLimit => OrderType::SellStopLimit,
            OrderType::SellStopLimit => OrderType::BuyStopLimit,
            OrderType::CloseBy => OrderType::CloseBy,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(
            self,
            OrderType::Buy | OrderType::BuyLimit | OrderType::BuyStop | OrderType::BuyStopLimit
        )
    }

    pub fn is_sell(&self) -> bool {
        matches!(
            self,
            OrderType::Sell | OrderType::SellLimit | OrderType::SellStop | OrderType::SellStopLimit
        )
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderType::Buy => "BUY",
            OrderType::Sell => "SELL",
            OrderType::BuyLimit => "BUY_LIMIT",
            OrderType::SellLimit => "SELL_LIMIT",
            OrderType::BuyStop => "BUY_STOP",
            OrderType::SellStop => "SELL_STOP",
            OrderType::BuyStopLimit => "BUY_STOP_LIMIT",
            OrderType::SellStopLimit => "SELL_STOP_LIMIT",
            OrderType::CloseBy => "CLOSE_BY",
        };
        write!(f, "{s}")
    }
}

/// Kind of trade operation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    /// Market order, executed immediately.
    #[default]
    Deal,
    /// Pending order placed at a price.
    Pending,
    /// Modify stop-loss / take-profit of an open position.
    Sltp,
    /// Modify a pending order.
    Modify,
    /// Delete a pending order.
    Remove,
    /// Close a position by an opposite one.
    CloseBy,
}

/// Order lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderTime {
    Gtc,
    #[default]
    Day,
    Specified,
    SpecifiedDay,
}

/// Fill policy for a market order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderFilling {
    /// Fill or kill.
    #[default]
    Fok,
    /// Immediate or cancel.
    Ioc,
    Return,
}

/// Direction of a deal relative to its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealEntry {
    In,
    Out,
}

/// Latest quote for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Unix seconds.
    pub time: i64,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
}

/// Filter for pending-order queries. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub ticket: Option<u64>,
    pub symbol: Option<String>,
    /// Symbol group, matched as a prefix (`"BTC"` matches `"BTCUSDT"`).
    pub group: Option<String>,
}

impl OrderFilter {
    pub fn ticket(ticket: u64) -> Self {
        Self {
            ticket: Some(ticket),
            ..Default::default()
        }
    }

    pub fn symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, ticket: u64, symbol: &str) -> bool {
        self.ticket.map_or(true, |t| t == ticket)
            && self.symbol.as_deref().map_or(true, |s| s == symbol)
            && self.group.as_deref().map_or(true, |g| symbol.starts_with(g))
    }
}

/// Open-position queries share the order filter semantics.
pub type PositionFilter = OrderFilter;

/// Current state of the trading engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
    Stopping,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
            EngineState::Stopping => write!(f, "stopping"),
        }
    }
}
