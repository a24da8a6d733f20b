//! Engine error taxonomy

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Data problems for a single symbol are deliberately *not* errors: the
/// loader returns `None` and the backtest skips the symbol. The variants
/// here are the failures a caller has to react to.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad configuration rejected before anything runs or persists
    #[error("validation error: {0}")]
    Validation(String),

    /// Timeframe string did not resolve to a canonical entry
    #[error("unsupported timeframe: {0}")]
    UnsupportedTimeframe(String),

    /// A symbol had fewer than the minimum usable rows after cleaning
    #[error("insufficient data for {symbol}: {rows} usable rows")]
    InsufficientData { symbol: String, rows: usize },

    /// A referenced strategy name is not in the registry
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    /// A strategy function failed while decorating a frame
    #[error("strategy '{name}' failed: {message}")]
    StrategyRuntime { name: String, message: String },

    /// Dynamic strategy source failed to parse
    #[error("strategy source error at offset {position}: {message}")]
    StrategyParse { message: String, position: usize },

    /// Network or 5xx-like exchange failure; retried on the next fire
    #[error("exchange transient error: {0}")]
    ExchangeTransient(String),

    /// Misconfiguration or permission failure from the exchange
    #[error("exchange permanent error: {0}")]
    ExchangePermanent(String),

    /// The run was cancelled between symbols
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// True for errors the scheduler retries on the next fire instead of
    /// failing the execution record.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::ExchangeTransient(_))
    }
}
