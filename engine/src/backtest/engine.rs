//! The backtest engine: compose strategies, simulate, aggregate, cache

use crate::backtest::{broker, metrics, BacktestConfig, BacktestSummary, BrokerConfig};
use crate::data::DataLoader;
use crate::error::EngineError;
use crate::indicators::calculate_sma;
use crate::strategy::{
    apply_filter_mask, StrategyContext, StrategyRegistry, StrategyRole, COL_ENTRY_PRICE,
    COL_ENTRY_SIG, COL_SELL_PRICE, COL_SELL_SIG,
};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// SMA windows precomputed onto every frame before strategies run. The
/// long windows are added only when the frame is deep enough to warm them.
const SMA_PRIMARY_PERIODS: [usize; 3] = [10, 20, 50];
const SMA_EXTENDED_PERIODS: [usize; 2] = [100, 200];
const EXTENDED_MIN_ROWS: usize = 200;

pub struct BacktestEngine {
    loader: Arc<DataLoader>,
    registry: Arc<StrategyRegistry>,
    cache: RwLock<HashMap<String, BacktestSummary>>,
}

impl BacktestEngine {
    pub fn new(loader: Arc<DataLoader>, registry: Arc<StrategyRegistry>) -> Self {
        Self {
            loader,
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn cached(&self, fingerprint: &str) -> Option<BacktestSummary> {
        self.cache.read().unwrap().get(fingerprint).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().unwrap().len()
    }

    pub fn clear_cache(&self) {
        self.cache.write().unwrap().clear();
    }

    pub async fn run(&self, config: &BacktestConfig, cancel: &AtomicBool) -> Result<BacktestSummary> {
        self.run_at(config, Utc::now(), cancel).await
    }

    /// Run with an explicit "now" reference for window resolution. A cached
    /// fingerprint short-circuits before any data is loaded.
    pub async fn run_at(
        &self,
        config: &BacktestConfig,
        now: DateTime<Utc>,
        cancel: &AtomicBool,
    ) -> Result<BacktestSummary> {
        config.validate()?;
        let fingerprint = config.fingerprint();
        if let Some(hit) = self.cached(&fingerprint) {
            info!(%fingerprint, "backtest cache hit");
            return Ok(hit);
        }

        // fail fast on unknown strategies before touching any data
        let (_, entry_fn) = self
            .registry
            .lookup(&config.entry_strategy, StrategyRole::Entry)?;
        let (_, exit_fn) = self
            .registry
            .lookup(&config.exit_strategy, StrategyRole::Exit)?;
        let filter_fn = match &config.filter_strategy {
            Some(name) => Some(self.registry.lookup(name, StrategyRole::Filter)?.1),
            None => None,
        };

        let window = config.resolve_window(now);
        let broker_config = BrokerConfig {
            initial_cash: config.initial_cash,
            risk_percent: config.risk_percent,
            commission: config.commission,
            max_position_fraction: config.max_position_fraction,
        };
        let ctx = StrategyContext::backtest(&config.parameters);

        let mut results = Vec::new();
        for symbol in &config.symbols {
            if cancel.load(Ordering::Relaxed) {
                return Err(EngineError::Cancelled);
            }
            let mut frame = match self
                .loader
                .load(symbol, config.timeframe.name(), Some(window))
                .await?
            {
                Some(frame) => frame,
                None => {
                    warn!(%symbol, "skipping symbol: insufficient data");
                    continue;
                }
            };

            precompute_smas(&mut frame);

            for (role, func) in [
                (StrategyRole::Entry, Some(&entry_fn)),
                (StrategyRole::Exit, Some(&exit_fn)),
                (StrategyRole::Filter, filter_fn.as_ref()),
            ] {
                let Some(func) = func else { continue };
                if let Err(err) = func(&mut frame, &ctx) {
                    warn!(%symbol, role = role.as_str(), %err, "strategy failed, synthesizing zero signals");
                    synthesize_zero_columns(&mut frame, role);
                }
            }
            apply_filter_mask(&mut frame)?;

            let outcome = broker::simulate(&frame, &broker_config);
            results.push(metrics::summarize(symbol, &outcome));
        }

        let summary = BacktestSummary::aggregate(&fingerprint, results);
        self.cache
            .write()
            .unwrap()
            .insert(fingerprint.clone(), summary.clone());
        info!(
            %fingerprint,
            symbols = summary.total_symbols,
            trades = summary.total_trades,
            "backtest completed"
        );
        Ok(summary)
    }
}

/// Add the fixed SMA columns and drop the warm-up rows where the widest
/// primary window is still NaN.
fn precompute_smas(frame: &mut crate::data::BarFrame) {
    let closes = frame.closes();
    let mut periods: Vec<usize> = SMA_PRIMARY_PERIODS.to_vec();
    if frame.len() >= EXTENDED_MIN_ROWS {
        periods.extend(SMA_EXTENDED_PERIODS);
    }
    for period in &periods {
        let column = calculate_sma(&closes, *period);
        // lengths always match, set_column cannot fail here
        let _ = frame.set_column(format!("sma_{}", period), column);
    }
    let widest = SMA_PRIMARY_PERIODS[SMA_PRIMARY_PERIODS.len() - 1];
    if let Some(values) = frame.column(&format!("sma_{}", widest)) {
        let keep: Vec<bool> = values.iter().map(|v| v.is_finite()).collect();
        frame.retain_rows(&keep);
    }
}

fn synthesize_zero_columns(frame: &mut crate::data::BarFrame, role: StrategyRole) {
    let zeros = vec![0.0; frame.len()];
    let columns: &[&str] = match role {
        StrategyRole::Entry => &[COL_ENTRY_SIG, COL_ENTRY_PRICE],
        StrategyRole::Exit => &[COL_SELL_SIG, COL_SELL_PRICE],
        StrategyRole::Filter => return, // no filter output means no masking
    };
    for column in columns {
        let _ = frame.set_column(*column, zeros.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Bar, BarFrame, Timeframe};
    use chrono::{Duration, TimeZone};

    fn frame(len: usize) -> BarFrame {
        let bars: Vec<Bar> = (0..len)
            .map(|i| {
                let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::hours(4 * i as i64);
                let price = 100.0 + (i as f64 * 0.1).sin() * 5.0;
                Bar::new(ts, price, price + 1.0, price - 1.0, price, 1000.0)
            })
            .collect();
        BarFrame::new("BTC-USDT", Timeframe::H4, bars)
    }

    #[test]
    fn precompute_drops_warm_up_rows() {
        let mut f = frame(120);
        precompute_smas(&mut f);
        assert_eq!(f.len(), 120 - 49);
        assert!(f.column("sma_50").unwrap().iter().all(|v| v.is_finite()));
        assert!(!f.has_column("sma_200"));
    }

    #[test]
    fn deep_frames_get_the_extended_windows() {
        let mut f = frame(260);
        precompute_smas(&mut f);
        assert!(f.has_column("sma_100"));
        assert!(f.has_column("sma_200"));
    }

    #[test]
    fn zero_synthesis_covers_the_failing_role_only() {
        let mut f = frame(60);
        synthesize_zero_columns(&mut f, StrategyRole::Entry);
        assert!(f.has_column(COL_ENTRY_SIG));
        assert!(!f.has_column(COL_SELL_SIG));
        assert!(f.column(COL_ENTRY_SIG).unwrap().iter().all(|&v| v == 0.0));
    }
}
