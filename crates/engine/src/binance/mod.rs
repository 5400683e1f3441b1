mod klines;

pub use klines::{parse_klines, BinanceKlines};
