/// Public Binance REST endpoint used for klines when `MARKET_DATA_URL` is unset.
pub const DEFAULT_MARKET_DATA_URL: &str = "https://api.binance.com";

/// All process configuration loaded from environment variables at startup.
/// Every variable has a default; malformed values cause an immediate panic
/// with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Market data
    pub market_data_url: String,

    // Paper broker
    pub paper_balance_usd: f64,
    pub paper_slippage_bps: f64,
    pub paper_leverage: f64,

    // Order execution
    pub order_retry_attempts: u32,
    pub order_retry_delay_ms: u64,

    // Strategy config file path
    pub strategy_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Config {
            market_data_url: optional_env("MARKET_DATA_URL")
                .unwrap_or_else(|| DEFAULT_MARKET_DATA_URL.to_string()),
            paper_balance_usd: parsed_env("PAPER_BALANCE_USD", 10_000.0),
            paper_slippage_bps: parsed_env("PAPER_SLIPPAGE_BPS", 10.0),
            paper_leverage: parsed_env("PAPER_LEVERAGE", 100.0),
            order_retry_attempts: parsed_env("ORDER_RETRY_ATTEMPTS", 3),
            order_retry_delay_ms: parsed_env("ORDER_RETRY_DELAY_MS", 1_000),
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match optional_env(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            panic!("Environment variable '{key}' has an invalid value: '{raw}'")
        }),
        None => default,
    }
}
