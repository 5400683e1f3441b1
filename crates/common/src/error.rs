use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Broker transport failure or missing data from the broker.
    #[error("Broker error: {0}")]
    Broker(String),

    /// A broker call answered with nothing. Holds the call name.
    #[error("No response from {0}")]
    NoResponse(&'static str),

    /// `order_check` returned no result.
    #[error("Order check failed for {symbol}")]
    OrderCheck { symbol: String },

    /// `order_send` returned no result.
    #[error("Failed to send order {symbol}")]
    OrderSend { symbol: String },

    #[error("Candle data error: {0}")]
    Candles(String),

    #[error("Indicator error: {0}")]
    Indicator(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors worth retrying: null broker responses and transport failures.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Broker(_)
                | Error::NoResponse(_)
                | Error::OrderCheck { .. }
                | Error::OrderSend { .. }
                | Error::Http(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
