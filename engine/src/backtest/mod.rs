//! Backtesting: configuration, broker simulation, metrics and the engine

pub mod broker;
pub mod config;
pub mod engine;
pub mod metrics;

pub use broker::{simulate, BrokerConfig, BrokerOutcome, Trade, TradeSide};
pub use config::BacktestConfig;
pub use engine::BacktestEngine;

use serde::{Deserialize, Serialize};

/// Per-symbol performance summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolResult {
    pub symbol: String,
    pub initial_value: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub annual_return: f64,
    pub sharpe: Option<f64>,
    pub max_drawdown: f64,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub total_entry_signals: u32,
    pub total_sell_signals: u32,
    pub signal_execution_rate: f64,
    pub duration_days: f64,
}

/// Aggregation over all symbols of one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub fingerprint: String,
    pub total_symbols: u32,
    pub avg_return: f64,
    pub best_symbol: Option<String>,
    pub best_return: f64,
    pub worst_symbol: Option<String>,
    pub worst_return: f64,
    pub total_trades: u32,
    pub avg_win_rate: f64,
    pub avg_sharpe: Option<f64>,
    pub symbol_results: Vec<SymbolResult>,
}

impl BacktestSummary {
    /// A summary with no per-symbol rows, used when every symbol lacked data.
    pub fn empty(fingerprint: &str) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            total_symbols: 0,
            avg_return: 0.0,
            best_symbol: None,
            best_return: 0.0,
            worst_symbol: None,
            worst_return: 0.0,
            total_trades: 0,
            avg_win_rate: 0.0,
            avg_sharpe: None,
            symbol_results: Vec::new(),
        }
    }

    pub fn aggregate(fingerprint: &str, results: Vec<SymbolResult>) -> Self {
        if results.is_empty() {
            return Self::empty(fingerprint);
        }
        let n = results.len() as f64;
        let avg_return = results.iter().map(|r| r.total_return).sum::<f64>() / n;
        let avg_win_rate = results.iter().map(|r| r.win_rate).sum::<f64>() / n;
        let sharpes: Vec<f64> = results.iter().filter_map(|r| r.sharpe).collect();
        let avg_sharpe = if sharpes.is_empty() {
            None
        } else {
            Some(sharpes.iter().sum::<f64>() / sharpes.len() as f64)
        };
        let best = results
            .iter()
            .max_by(|a, b| a.total_return.total_cmp(&b.total_return))
            .cloned();
        let worst = results
            .iter()
            .min_by(|a, b| a.total_return.total_cmp(&b.total_return))
            .cloned();
        Self {
            fingerprint: fingerprint.to_string(),
            total_symbols: results.len() as u32,
            avg_return,
            best_symbol: best.as_ref().map(|r| r.symbol.clone()),
            best_return: best.map(|r| r.total_return).unwrap_or(0.0),
            worst_symbol: worst.as_ref().map(|r| r.symbol.clone()),
            worst_return: worst.map(|r| r.total_return).unwrap_or(0.0),
            total_trades: results.iter().map(|r| r.total_trades).sum(),
            avg_win_rate,
            avg_sharpe,
            symbol_results: results,
        }
    }
}
