pub mod cross;
pub mod ema;

pub use cross::{above, below, cross};
pub use ema::{ema, fill_na};
