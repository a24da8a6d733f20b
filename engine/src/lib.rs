//! Spotpilot engine: the data + signal + order pipeline.
//!
//! This crate holds everything the backtest and live paths share:
//!
//! - **Data Management**: OHLCV bar loading from the exchange, the local
//!   store, and on-disk CSV files, with an LRU frame cache
//! - **Technical Indicators**: SMA, EMA, RSI, MACD, Bollinger Bands, ADX
//! - **Strategy Registry**: named entry/exit/filter strategies, built-in and
//!   dynamically registered from a restricted condition DSL
//! - **Backtesting**: broker simulation with performance metrics, keyed by a
//!   deterministic configuration fingerprint
//! - **Exchange Integration**: the spot order/market client contract with an
//!   OKX-style REST implementation and an in-memory mock
//! - **Live Evaluation**: last-bar signal evaluation and order planning used
//!   by the scheduler

pub mod backtest;
pub mod data;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod live;
pub mod strategy;

// Re-export commonly used types
pub mod prelude {
    pub use crate::backtest::*;
    pub use crate::data::*;
    pub use crate::error::EngineError;
    pub use crate::exchange::*;
    pub use crate::indicators::*;
    pub use crate::live::*;
    pub use crate::strategy::*;
}

/// Result type alias
pub type Result<T, E = error::EngineError> = std::result::Result<T, E>;
