//! Technical indicators
//!
//! Frame-level indicator functions computed with the `ta` crate (ADX is
//! computed directly, `ta` does not provide it). Every function returns a
//! vector with the same length as its input, with NaN for warm-up rows.

pub mod adx;
pub mod bb;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod service;
pub mod sma;

pub use adx::calculate_adx;
pub use bb::{calculate_bollinger, BollingerChannel};
pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdChannel};
pub use rsi::calculate_rsi;
pub use service::IndicatorService;
pub use sma::calculate_sma;
