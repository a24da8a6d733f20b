//! Strategy roles, contracts and the process-wide registry
//!
//! A strategy is a function that decorates a [`BarFrame`] with signal
//! columns. Three roles compose into a pipeline:
//!
//! - **entry** writes `entry_sig` ∈ {0,1} and `entry_price` (0 = use close)
//! - **exit** writes `sell_sig` ∈ {0,1} and `sell_price` (0 = use close)
//! - **filter** writes `filter_ok` ∈ {0,1}; masking can only turn entry
//!   signals off, never on
//!
//! Entry and exit strategies may also publish a `stop_loss` column, which
//! drives risk-based sizing in the backtest and trailing-stop amendments
//! in live execution.

pub mod builtin;
pub mod dsl;
pub mod dynamic;
pub mod registry;

pub use dynamic::{DynamicStrategyDef, DynamicStrategyStore};
pub use registry::StrategyRegistry;

use crate::data::BarFrame;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const COL_ENTRY_SIG: &str = "entry_sig";
pub const COL_ENTRY_PRICE: &str = "entry_price";
pub const COL_SELL_SIG: &str = "sell_sig";
pub const COL_SELL_PRICE: &str = "sell_price";
pub const COL_STOP_LOSS: &str = "stop_loss";
pub const COL_FILTER_OK: &str = "filter_ok";

/// The three roles a strategy function can play
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyRole {
    Entry,
    Exit,
    Filter,
}

impl StrategyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyRole::Entry => "entry",
            StrategyRole::Exit => "exit",
            StrategyRole::Filter => "filter",
        }
    }

    pub fn parse(raw: &str) -> Option<StrategyRole> {
        match raw.to_lowercase().as_str() {
            "entry" => Some(StrategyRole::Entry),
            "exit" => Some(StrategyRole::Exit),
            "filter" => Some(StrategyRole::Filter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategySide {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    #[default]
    Active,
    Inactive,
    Deprecated,
}

/// Metadata recorded for every registered strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyMeta {
    pub name: String,
    pub role: StrategyRole,
    pub side: StrategySide,
    pub description: String,
    #[serde(default)]
    pub status: StrategyStatus,
}

/// Context passed to live evaluations; absent in backtest mode.
#[derive(Debug, Clone)]
pub struct LiveContext {
    pub symbol: String,
}

/// Per-invocation context: strategy parameters plus the live marker.
pub struct StrategyContext<'a> {
    pub params: &'a serde_json::Value,
    pub live: Option<&'a LiveContext>,
}

impl<'a> StrategyContext<'a> {
    pub fn backtest(params: &'a serde_json::Value) -> Self {
        Self { params, live: None }
    }

    pub fn live(params: &'a serde_json::Value, live: &'a LiveContext) -> Self {
        Self {
            params,
            live: Some(live),
        }
    }

    pub fn param_usize(&self, name: &str, default: usize) -> usize {
        self.params
            .get(name)
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    pub fn param_f64(&self, name: &str, default: f64) -> f64 {
        self.params
            .get(name)
            .and_then(|v| v.as_f64())
            .unwrap_or(default)
    }
}

/// A strategy function: decorates the frame with its role's columns.
pub type StrategyFn = Arc<dyn Fn(&mut BarFrame, &StrategyContext) -> Result<()> + Send + Sync>;

/// Force `entry_sig` to 0 wherever the filter failed. Applying the filter
/// strategy and then this mask is equivalent to masking after entry.
pub fn apply_filter_mask(frame: &mut BarFrame) -> Result<()> {
    if !frame.has_column(COL_FILTER_OK) || !frame.has_column(COL_ENTRY_SIG) {
        return Ok(());
    }
    let mask = frame.column_or_zeros(COL_FILTER_OK);
    let mut entry = frame.column_or_zeros(COL_ENTRY_SIG);
    for (sig, ok) in entry.iter_mut().zip(mask.iter()) {
        if *ok == 0.0 || !ok.is_finite() {
            *sig = 0.0;
        }
    }
    frame.set_column(COL_ENTRY_SIG, entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Bar, Timeframe};
    use chrono::{Duration, TimeZone, Utc};

    fn frame(len: usize) -> BarFrame {
        let bars: Vec<Bar> = (0..len)
            .map(|i| {
                let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::hours(i as i64);
                Bar::new(ts, 100.0, 101.0, 99.0, 100.0, 1000.0)
            })
            .collect();
        BarFrame::new("BTC-USDT", Timeframe::H1, bars)
    }

    #[test]
    fn filter_mask_only_turns_signals_off() {
        let mut f = frame(4);
        f.set_column(COL_ENTRY_SIG, vec![1.0, 0.0, 1.0, 1.0]).unwrap();
        f.set_column(COL_FILTER_OK, vec![1.0, 1.0, 0.0, f64::NAN]).unwrap();
        apply_filter_mask(&mut f).unwrap();
        assert_eq!(f.column(COL_ENTRY_SIG).unwrap(), &[1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_filter_column_is_a_no_op() {
        let mut f = frame(2);
        f.set_column(COL_ENTRY_SIG, vec![1.0, 1.0]).unwrap();
        apply_filter_mask(&mut f).unwrap();
        assert_eq!(f.column(COL_ENTRY_SIG).unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn context_params_fall_back_to_defaults() {
        let params = serde_json::json!({"period": 21});
        let ctx = StrategyContext::backtest(&params);
        assert_eq!(ctx.param_usize("period", 14), 21);
        assert_eq!(ctx.param_usize("other", 14), 14);
        assert_eq!(ctx.param_f64("threshold", 30.0), 30.0);
    }
}
