use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use common::{Error, Result, Sessions};

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "finger_trap"
/// name = "BTC FingerTrap"
/// symbol = "BTCUSDT"
/// volume = 0.001
/// stop_loss_pct = 0.01
///
/// [strategy.params]
/// ttf = "H1"
/// etf = "M5"
/// fast_ema = 8
/// slow_ema = 20
///
/// [[strategy.sessions]]
/// start = "07:00"
/// end = "21:00"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy type identifier, currently only "finger_trap".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Human-readable name shown in logs.
    pub name: String,
    /// Symbol to trade, e.g. "BTCUSDT".
    pub symbol: String,
    /// Order volume in base asset units.
    pub volume: f64,
    /// Stop-loss distance as a fraction of entry price. No SL/TP when unset.
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,
    /// Take-profit distance as a multiple of the stop-loss distance.
    #[serde(default = "default_risk_to_reward")]
    pub risk_to_reward: f64,
    /// Allowed slippage in points.
    #[serde(default)]
    pub deviation: u32,
    /// Expert id stamped on every request.
    #[serde(default)]
    pub magic: u64,
    /// Trading windows; empty means always open.
    #[serde(default)]
    pub sessions: Sessions,
    /// Strategy-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

fn default_risk_to_reward() -> f64 {
    2.0
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("strategy config at '{path}': {e}")))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        for s in &cfg.strategies {
            if s.volume <= 0.0 {
                return Err(Error::Config(format!(
                    "strategy '{}' has non-positive volume {}",
                    s.name, s.volume
                )));
            }
        }
        Ok(cfg)
    }
}
