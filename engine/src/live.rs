//! Live signal evaluation: last-bar decisions and order planning
//!
//! The scheduler runs the same strategy functions the backtest uses, then
//! only looks at the newest bar. This module turns that last row into an
//! order plan (entry, protective stop, take-profit, size) or a trailing
//! stop level for an already-open order.

use crate::backtest::broker::MIN_ORDER_SIZE;
use crate::data::BarFrame;
use crate::error::EngineError;
use crate::strategy::{
    apply_filter_mask, LiveContext, StrategyContext, StrategyRegistry, StrategyRole,
    COL_ENTRY_PRICE, COL_ENTRY_SIG, COL_STOP_LOSS,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Protective defaults when the strategy does not publish its own levels.
pub const DEFAULT_STOP_RATIO: f64 = 0.98;
pub const DEFAULT_TAKE_PROFIT_RATIO: f64 = 1.02;

/// How an instance sizes its live orders. Exactly one of the two is set
/// on a strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingPolicy {
    /// Fixed quote-currency notional per entry.
    EntryPerTrans(f64),
    /// Fixed quote-currency loss if the stop is hit; converted to units
    /// through the distance between entry and stop.
    LossPerTrans(f64),
}

/// A fully priced order ready for the exchange client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlan {
    pub symbol: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub size: f64,
}

/// The raw last-bar entry decision before sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySignal {
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

pub struct LiveEvaluator {
    registry: Arc<StrategyRegistry>,
}

impl LiveEvaluator {
    pub fn new(registry: Arc<StrategyRegistry>) -> Self {
        Self { registry }
    }

    /// Run entry (and optional filter) over the frame and read the last
    /// row. `Ok(None)` when the newest bar carries no actionable signal.
    pub fn evaluate_entry(
        &self,
        frame: &mut BarFrame,
        entry_name: &str,
        filter_name: Option<&str>,
        params: &serde_json::Value,
        live: &LiveContext,
    ) -> Result<Option<EntrySignal>> {
        if frame.is_empty() {
            return Ok(None);
        }
        let (_, entry_fn) = self.registry.lookup(entry_name, StrategyRole::Entry)?;
        let ctx = StrategyContext::live(params, live);
        entry_fn(frame, &ctx)?;
        if let Some(name) = filter_name {
            let (_, filter_fn) = self.registry.lookup(name, StrategyRole::Filter)?;
            if let Err(err) = filter_fn(frame, &ctx) {
                warn!(symbol = %live.symbol, %err, "filter failed, suppressing entry");
                return Ok(None);
            }
            apply_filter_mask(frame)?;
        }

        let last = frame.len() - 1;
        let sig = frame.column_or_zeros(COL_ENTRY_SIG);
        if sig[last] != 1.0 {
            return Ok(None);
        }
        let price_col = frame.column_or_zeros(COL_ENTRY_PRICE);
        let close = frame.closes()[last];
        let entry_price = if price_col[last] > 0.0 {
            price_col[last]
        } else {
            close
        };
        let stop_loss = frame
            .column(COL_STOP_LOSS)
            .map(|c| c[last])
            .filter(|&s| s > 0.0 && s < entry_price);
        Ok(Some(EntrySignal {
            entry_price,
            stop_loss,
            take_profit: None,
        }))
    }

    /// Run the exit strategy and return the stop level it publishes for
    /// the newest bar, if any. Used to trail stops on open orders.
    pub fn evaluate_stop_level(
        &self,
        frame: &mut BarFrame,
        exit_name: &str,
        params: &serde_json::Value,
        live: &LiveContext,
    ) -> Result<Option<f64>> {
        if frame.is_empty() {
            return Ok(None);
        }
        let (_, exit_fn) = self.registry.lookup(exit_name, StrategyRole::Exit)?;
        let ctx = StrategyContext::live(params, live);
        exit_fn(frame, &ctx)?;
        let last = frame.len() - 1;
        Ok(frame
            .column(COL_STOP_LOSS)
            .map(|c| c[last])
            .filter(|&s| s > 0.0))
    }
}

/// Price and size an entry signal. Missing protective levels fall back to
/// fixed ratios around the entry.
pub fn plan_order(
    symbol: &str,
    signal: &EntrySignal,
    sizing: SizingPolicy,
) -> Result<Option<OrderPlan>> {
    let entry_price = signal.entry_price;
    if entry_price <= 0.0 {
        return Err(EngineError::Validation(format!(
            "entry price must be positive, got {}",
            entry_price
        )));
    }
    let stop_loss = signal
        .stop_loss
        .unwrap_or(entry_price * DEFAULT_STOP_RATIO);
    let take_profit = signal
        .take_profit
        .unwrap_or(entry_price * DEFAULT_TAKE_PROFIT_RATIO);

    let size = match sizing {
        SizingPolicy::EntryPerTrans(notional) => notional / entry_price,
        SizingPolicy::LossPerTrans(loss) => {
            let per_unit = entry_price - stop_loss;
            if per_unit <= 0.0 {
                return Ok(None);
            }
            loss / per_unit
        }
    };
    if size < MIN_ORDER_SIZE {
        return Ok(None);
    }
    Ok(Some(OrderPlan {
        symbol: symbol.to_string(),
        entry_price,
        stop_loss,
        take_profit,
        size,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Bar, Timeframe};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn falling_frame(len: usize) -> BarFrame {
        let bars: Vec<Bar> = (0..len)
            .map(|i| {
                let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::hours(i as i64);
                let price = 300.0 - i as f64 * 2.0;
                Bar::new(ts, price, price + 0.5, price - 0.5, price, 1000.0)
            })
            .collect();
        BarFrame::new("BTC-USDT", Timeframe::H1, bars)
    }

    fn signal(entry: f64, stop: Option<f64>) -> EntrySignal {
        EntrySignal {
            entry_price: entry,
            stop_loss: stop,
            take_profit: None,
        }
    }

    #[test]
    fn entry_fires_on_the_last_bar_only() {
        let evaluator = LiveEvaluator::new(Arc::new(StrategyRegistry::with_builtins()));
        let live = LiveContext {
            symbol: "BTC-USDT".into(),
        };
        // a long fall keeps RSI pinned low, so the newest bar is oversold
        let mut frame = falling_frame(100);
        let params = serde_json::json!({"period": 14, "threshold": 30.0});
        let found = evaluator
            .evaluate_entry(&mut frame, "rsi_oversold", None, &params, &live)
            .unwrap();
        let sig = found.expect("newest bar must be oversold");
        assert_eq!(sig.entry_price, frame.closes()[frame.len() - 1]);
        assert!(sig.stop_loss.unwrap() < sig.entry_price);
    }

    #[test]
    fn unknown_strategy_fails_fast() {
        let evaluator = LiveEvaluator::new(Arc::new(StrategyRegistry::with_builtins()));
        let live = LiveContext {
            symbol: "BTC-USDT".into(),
        };
        let mut frame = falling_frame(50);
        let params = serde_json::json!({});
        assert!(matches!(
            evaluator.evaluate_entry(&mut frame, "nope", None, &params, &live),
            Err(EngineError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn plan_defaults_protective_levels() {
        let plan = plan_order("BTC-USDT", &signal(100.0, None), SizingPolicy::EntryPerTrans(500.0))
            .unwrap()
            .unwrap();
        assert_relative_eq!(plan.stop_loss, 98.0, epsilon = 1e-9);
        assert_relative_eq!(plan.take_profit, 102.0, epsilon = 1e-9);
        assert_relative_eq!(plan.size, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn loss_per_trans_sizes_through_the_stop_distance() {
        let plan = plan_order(
            "BTC-USDT",
            &signal(100.0, Some(95.0)),
            SizingPolicy::LossPerTrans(50.0),
        )
        .unwrap()
        .unwrap();
        assert_relative_eq!(plan.size, 10.0, epsilon = 1e-9);
        assert_relative_eq!(plan.stop_loss, 95.0, epsilon = 1e-9);
    }

    #[test]
    fn dust_sizes_are_dropped() {
        let plan = plan_order(
            "BTC-USDT",
            &signal(100_000.0, None),
            SizingPolicy::EntryPerTrans(1.0),
        )
        .unwrap();
        assert!(plan.is_none());
    }
}
