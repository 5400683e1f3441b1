use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use common::{Bar, CandleSource, Candles, Error, Result, TimeFrame};

/// Largest `limit` the klines endpoint accepts.
const MAX_LIMIT: usize = 1000;

/// Candle source backed by the public Binance klines endpoint. No API key
/// is needed.
pub struct BinanceKlines {
    base_url: String,
    http: Client,
}

impl BinanceKlines {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl CandleSource for BinanceKlines {
    async fn fetch(&self, symbol: &str, timeframe: TimeFrame, count: usize) -> Result<Candles> {
        let interval = timeframe
            .binance_interval()
            .ok_or_else(|| Error::Candles(format!("Binance has no {timeframe} klines")))?;
        let limit = count.clamp(1, MAX_LIMIT);
        let url = format!(
            "{}/api/v3/klines?symbol={symbol}&interval={interval}&limit={limit}",
            self.base_url
        );

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status}: {body}")));
        }

        let bars = parse_klines(&body)?;
        debug!(symbol, timeframe = %timeframe, bars = bars.len(), "Fetched klines");
        Candles::new(bars)
    }
}

/// Parse the array-of-arrays klines payload. Prices arrive as strings and
/// open times in milliseconds.
pub fn parse_klines(body: &str) -> Result<Vec<Bar>> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| Error::Candles(format!("bad klines payload: {e}")))?;

    rows.iter()
        .map(|row| {
            let open_ms = row
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| Error::Candles("kline without open time".into()))?;
            Ok(Bar {
                time: open_ms / 1000,
                open: field(row, 1)?,
                high: field(row, 2)?,
                low: field(row, 3)?,
                close: field(row, 4)?,
                tick_volume: field(row, 5)?,
            })
        })
        .collect()
}

fn field(row: &[Value], idx: usize) -> Result<f64> {
    match row.get(idx) {
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| Error::Candles(format!("kline field {idx} is not a number: '{s}'"))),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| Error::Candles(format!("kline field {idx} out of range"))),
        _ => Err(Error::Candles(format!("kline field {idx} missing"))),
    }
}
