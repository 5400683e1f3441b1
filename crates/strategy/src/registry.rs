use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use common::{CandleSource, Error, Result, TimeFrame};

use crate::config::{StrategyConfig, StrategyFileConfig};
use crate::finger_trap::{FingerTrap, FingerTrapParams};
use crate::Strategy;

/// A built strategy together with the config it came from.
pub struct RegisteredStrategy {
    pub config: StrategyConfig,
    pub strategy: Box<dyn Strategy>,
}

/// Builds every configured strategy instance against one candle source.
pub struct StrategyRegistry {
    entries: Vec<RegisteredStrategy>,
}

impl StrategyRegistry {
    /// Build the registry from config. Unknown strategy types or malformed
    /// parameters are configuration errors.
    pub fn from_config(file_cfg: &StrategyFileConfig, source: Arc<dyn CandleSource>) -> Result<Self> {
        let mut entries = Vec::with_capacity(file_cfg.strategies.len());

        for cfg in &file_cfg.strategies {
            let strategy = build_strategy(cfg, source.clone())?;
            info!(name = %strategy.name(), symbol = %strategy.symbol(), "Registered strategy");
            entries.push(RegisteredStrategy {
                config: cfg.clone(),
                strategy,
            });
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct symbols across all strategies, in config order.
    pub fn symbols(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .iter()
            .filter(|e| seen.insert(e.config.symbol.clone()))
            .map(|e| e.config.symbol.clone())
            .collect()
    }

    pub fn into_entries(self) -> Vec<RegisteredStrategy> {
        self.entries
    }
}

// ─── Strategy builders ────────────────────────────────────────────────────────

fn build_strategy(cfg: &StrategyConfig, source: Arc<dyn CandleSource>) -> Result<Box<dyn Strategy>> {
    match cfg.strategy_type.as_str() {
        "finger_trap" => {
            let defaults = FingerTrapParams::default();
            let params = FingerTrapParams {
                ttf: param_timeframe(&cfg.params, "ttf", defaults.ttf)?,
                etf: param_timeframe(&cfg.params, "etf", defaults.etf)?,
                fast_ema: param_usize(&cfg.params, "fast_ema", defaults.fast_ema)?,
                slow_ema: param_usize(&cfg.params, "slow_ema", defaults.slow_ema)?,
                entry_ema: param_usize(&cfg.params, "entry_ema", defaults.entry_ema)?,
                tcc: param_usize(&cfg.params, "tcc", defaults.tcc)?,
                ecc: param_usize(&cfg.params, "ecc", defaults.ecc)?,
            };
            if params.fast_ema >= params.slow_ema {
                return Err(Error::Config(format!(
                    "strategy '{}': fast_ema ({}) must be less than slow_ema ({})",
                    cfg.name, params.fast_ema, params.slow_ema
                )));
            }
            // Too few bars leave the EMA columns empty and the trend never forms.
            if params.tcc <= params.slow_ema {
                return Err(Error::Config(format!(
                    "strategy '{}': tcc ({}) must exceed slow_ema ({})",
                    cfg.name, params.tcc, params.slow_ema
                )));
            }
            if params.ecc <= params.entry_ema {
                return Err(Error::Config(format!(
                    "strategy '{}': ecc ({}) must exceed entry_ema ({})",
                    cfg.name, params.ecc, params.entry_ema
                )));
            }
            Ok(Box::new(FingerTrap::new(&cfg.name, &cfg.symbol, params, source)))
        }
        other => Err(Error::Config(format!("unknown strategy type '{other}'"))),
    }
}

fn param_usize(params: &HashMap<String, toml::Value>, key: &str, default: usize) -> Result<usize> {
    match params.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_integer()
            .filter(|&n| n > 0)
            .map(|n| n as usize)
            .ok_or_else(|| Error::Config(format!("parameter '{key}' must be a positive integer, got {v}"))),
    }
}

fn param_timeframe(
    params: &HashMap<String, toml::Value>,
    key: &str,
    default: TimeFrame,
) -> Result<TimeFrame> {
    match params.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_str()
            .ok_or_else(|| Error::Config(format!("parameter '{key}' must be a string, got {v}")))?
            .parse(),
    }
}
