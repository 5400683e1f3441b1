pub mod broker;
pub mod candles;
pub mod config;
pub mod error;
pub mod request;
pub mod session;
pub mod types;

pub use broker::{Broker, CandleSource};
pub use candles::{Bar, Candles};
pub use config::Config;
pub use error::{Error, Result};
pub use request::*;
pub use session::{Session, Sessions};
pub use types::*;
