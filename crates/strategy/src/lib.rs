pub mod config;
pub mod finger_trap;
pub mod indicators;
pub mod registry;
pub mod tracker;

pub use config::{StrategyConfig, StrategyFileConfig};
pub use finger_trap::{FingerTrap, FingerTrapParams};
pub use registry::{RegisteredStrategy, StrategyRegistry};
pub use tracker::{Tracker, TrackerUpdate};

use std::time::Duration;

use async_trait::async_trait;

use common::OrderType;

/// What a strategy wants the runner to do after one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// A bar newer than the last processed one was seen.
    pub new: bool,
    /// Order to place, if the entry was confirmed this cycle.
    pub order_type: Option<OrderType>,
    /// How long to sleep before the next poll.
    pub snooze: Duration,
}

/// Outcome of one evaluation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    /// A current bar was evaluated and the tracker updated.
    Fresh,
    /// The newest bar is older than the last one processed. Nothing recomputed.
    Stale,
    /// The stage failed; the tracker was reset to a safe no-signal state.
    Degraded(String),
}

impl StageResult {
    pub fn is_degraded(&self) -> bool {
        matches!(self, StageResult::Degraded(_))
    }
}

/// Evaluation stages, used to label logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CheckTrend,
    ConfirmTrend,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::CheckTrend => write!(f, "check_trend"),
            Stage::ConfirmTrend => write!(f, "confirm_trend"),
        }
    }
}

/// All strategy implementations must satisfy this trait.
///
/// A strategy owns its own state and is driven by exactly one runner task,
/// hence `&mut self` and no `Sync` bound.
#[async_trait]
pub trait Strategy: Send {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    /// The symbol this strategy trades (e.g. "BTCUSDT").
    fn symbol(&self) -> &str;

    /// The slow timeframe interval: delay before the first poll and the
    /// backoff after a failed cycle.
    fn base_interval(&self) -> Duration;

    /// Sample the market, update internal state and report a decision.
    /// Never fails: stage errors degrade to a no-signal decision.
    async fn watch_market(&mut self) -> Decision;
}
