//! One scheduled fire of a strategy instance
//!
//! Per symbol: an already-open algorithmic order gets its stop trailed
//! upward (never down); otherwise the entry pipeline runs on the newest
//! bars and a filled signal becomes an OCO buy with attached take-profit
//! and stop-loss triggers.

use anyhow::Result;
use chrono::Utc;
use engine::data::DataLoader;
use engine::error::EngineError;
use engine::exchange::{AlgoOrderRequest, OrderSide, SpotExchangeApi};
use engine::live::{plan_order, LiveEvaluator, OrderPlan};
use engine::strategy::LiveContext;
use sea_orm::DatabaseConnection;
use shared::entity::strategy_instances;
use shared::repo::execution_repo::{self, ExecutionTotals};
use shared::repo::{instance_repo, order_repo};
use std::sync::Arc;
use tracing::{info, warn};

/// Bars loaded for each live evaluation.
const LIVE_BARS: usize = 100;

/// The amendment target for an open order's stop. Stops only ratchet
/// upward: a proposed level at or below the current stop yields `None`.
pub fn trail_target(current_stop: Option<f64>, proposed: Option<f64>) -> Option<f64> {
    let level = proposed?;
    match current_stop {
        Some(current) if level <= current => None,
        _ => Some(level),
    }
}

pub struct Executor {
    db: DatabaseConnection,
    loader: Arc<DataLoader>,
    evaluator: LiveEvaluator,
    exchange: Arc<dyn SpotExchangeApi>,
}

impl Executor {
    pub fn new(
        db: DatabaseConnection,
        loader: Arc<DataLoader>,
        evaluator: LiveEvaluator,
        exchange: Arc<dyn SpotExchangeApi>,
    ) -> Self {
        Self {
            db,
            loader,
            evaluator,
            exchange,
        }
    }

    /// Run one fire end to end and persist `next` as the upcoming fire
    /// time. Never propagates into the scheduler loop: every failure lands
    /// on the execution record instead.
    pub async fn fire(
        &self,
        instance: &strategy_instances::Model,
        next: Option<chrono::DateTime<Utc>>,
    ) -> Result<ExecutionTotals> {
        let record_id = execution_repo::create_running(&self.db, instance.id).await?;
        let mut totals = ExecutionTotals::default();

        match self.process_symbols(instance, &mut totals).await {
            Ok(details) => {
                execution_repo::mark_completed(&self.db, record_id, totals, Some(details)).await?;
            }
            Err(err) => {
                warn!(instance = instance.id, %err, "execution failed");
                execution_repo::mark_failed(&self.db, record_id, &err.to_string(), totals).await?;
            }
        }
        instance_repo::record_execution(&self.db, instance.id, Utc::now(), next).await?;
        Ok(totals)
    }

    /// Symbols run sequentially in their declared order. Transient exchange
    /// failures abandon the symbol for this fire; permanent failures abort
    /// the whole fire.
    async fn process_symbols(
        &self,
        instance: &strategy_instances::Model,
        totals: &mut ExecutionTotals,
    ) -> Result<serde_json::Value> {
        let symbols = instance_repo::instance_symbols(instance);
        let params = instance_repo::instance_params(instance);
        let sizing = instance_repo::sizing_policy(instance)?;
        let mut details = Vec::new();

        for symbol in &symbols {
            let outcome = self
                .process_symbol(instance, symbol, &params, sizing, totals)
                .await;
            match outcome {
                Ok(note) => {
                    totals.symbols_processed += 1;
                    details.push(serde_json::json!({"symbol": symbol, "outcome": note}));
                }
                Err(err) => match err.downcast_ref::<EngineError>() {
                    Some(engine_err) if engine_err.is_transient() => {
                        warn!(%symbol, %err, "transient exchange failure, retrying next fire");
                        details.push(serde_json::json!({"symbol": symbol, "outcome": "transient-error"}));
                    }
                    _ => return Err(err),
                },
            }
        }
        Ok(serde_json::Value::Array(details))
    }

    async fn process_symbol(
        &self,
        instance: &strategy_instances::Model,
        symbol: &str,
        params: &serde_json::Value,
        sizing: engine::live::SizingPolicy,
        totals: &mut ExecutionTotals,
    ) -> Result<&'static str> {
        let Some(mut frame) = self
            .loader
            .load_latest(symbol, &instance.timeframe, LIVE_BARS)
            .await?
        else {
            warn!(%symbol, "no usable bars, skipping");
            return Ok("no-data");
        };
        let live = LiveContext {
            symbol: symbol.to_string(),
        };

        if let Some(open) = order_repo::find_open(&self.db, instance.id, symbol).await? {
            // Reconcile with the venue first; a terminal order is closed
            // out locally and the symbol waits for the next fire.
            if let Some(algo_id) = open.algo_id.clone() {
                let status = self.exchange.get_algo_order(&algo_id).await?;
                if status.state.is_terminal() {
                    order_repo::update_state(&self.db, open.id, status.state, status.exec_price)
                        .await?;
                    return Ok("order-settled");
                }
                let new_stop = self.evaluator.evaluate_stop_level(
                    &mut frame,
                    &instance.exit_strategy,
                    params,
                    &live,
                )?;
                if let Some(level) = trail_target(open.stop_price, new_stop) {
                    self.exchange
                        .amend_algo_order(symbol, &algo_id, Some(level), None)
                        .await?;
                    order_repo::update_stop_price(&self.db, open.id, level).await?;
                    totals.stops_amended += 1;
                    info!(%symbol, to = level, "trailed stop up");
                    return Ok("stop-amended");
                }
            }
            return Ok("order-held");
        }

        let signal = self.evaluator.evaluate_entry(
            &mut frame,
            &instance.entry_strategy,
            instance.filter_strategy.as_deref(),
            params,
            &live,
        )?;
        let Some(signal) = signal else {
            return Ok("no-signal");
        };
        let Some(plan) = plan_order(symbol, &signal, sizing)? else {
            return Ok("size-below-floor");
        };
        self.place_entry(instance.id, &plan).await?;
        totals.orders_placed += 1;
        info!(%symbol, entry = plan.entry_price, size = plan.size, "placed OCO entry");
        Ok("order-placed")
    }

    async fn place_entry(&self, instance_id: u64, plan: &OrderPlan) -> Result<()> {
        let cl_ord_id = order_repo::new_client_order_id();
        let ack = self
            .exchange
            .place_algo_order(AlgoOrderRequest {
                inst_id: plan.symbol.clone(),
                td_mode: "cash".to_string(),
                side: OrderSide::Buy,
                ord_type: "oco".to_string(),
                sz: plan.size,
                tp_trigger_px: Some(plan.take_profit),
                tp_ord_px: Some(-1.0), // market execution on trigger
                sl_trigger_px: Some(plan.stop_loss),
                sl_ord_px: Some(-1.0),
                cl_ord_id: cl_ord_id.clone(),
            })
            .await?;
        order_repo::insert_placed(
            &self.db,
            instance_id,
            plan,
            &cl_ord_id,
            None,
            Some(&ack.algo_id),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::data::{Bar, BarFrame, Timeframe};
    use engine::exchange::{AlgoOrderRequest, MockExchange, OrderSide};
    use engine::strategy::StrategyRegistry;
    use chrono::TimeZone;

    #[test]
    fn trail_target_only_moves_up() {
        assert_eq!(trail_target(Some(98.0), Some(99.0)), Some(99.0));
        assert_eq!(trail_target(Some(98.0), Some(98.0)), None);
        assert_eq!(trail_target(Some(98.0), Some(97.0)), None);
        // an order placed without a stop accepts any level
        assert_eq!(trail_target(None, Some(95.0)), Some(95.0));
        assert_eq!(trail_target(Some(98.0), None), None);
    }

    fn frame_from_closes(closes: &[f64]) -> BarFrame {
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(i as i64);
                Bar::new(ts, close, close + 1.0, close - 1.0, close, 1000.0)
            })
            .collect();
        BarFrame::new("BTC-USDT", Timeframe::H1, bars)
    }

    #[tokio::test]
    async fn amended_stop_trigger_never_decreases() {
        let exchange = MockExchange::new();
        let ack = exchange
            .place_algo_order(AlgoOrderRequest {
                inst_id: "BTC-USDT".into(),
                td_mode: "cash".into(),
                side: OrderSide::Buy,
                ord_type: "oco".into(),
                sz: 1.0,
                tp_trigger_px: Some(150.0),
                tp_ord_px: Some(-1.0),
                sl_trigger_px: Some(95.0),
                sl_ord_px: Some(-1.0),
                cl_ord_id: "c1".into(),
            })
            .await
            .unwrap();

        // rally, pullback, then sideways chop under the high-water mark
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        closes.extend((0..20).map(|i| 139.0 - i as f64));
        closes.extend(std::iter::repeat(125.0).take(20));

        let evaluator = LiveEvaluator::new(Arc::new(StrategyRegistry::with_builtins()));
        let live = LiveContext {
            symbol: "BTC-USDT".into(),
        };
        let params = serde_json::json!({"trail_pct": 0.02});

        let mut current = Some(95.0);
        for seen in [20, 30, 40, 60, 80] {
            let mut frame = frame_from_closes(&closes[..seen]);
            let proposed = evaluator
                .evaluate_stop_level(&mut frame, "trailing_stop", &params, &live)
                .unwrap();
            if let Some(level) = trail_target(current, proposed) {
                exchange
                    .amend_algo_order("BTC-USDT", &ack.algo_id, Some(level), None)
                    .await
                    .unwrap();
                current = Some(level);
            }
        }

        let triggers: Vec<f64> = exchange
            .amendments()
            .into_iter()
            .filter_map(|(_, px)| px)
            .collect();
        // the rally amends three times; pullback and chop leave the stop alone
        assert_eq!(triggers.len(), 3);
        assert!(triggers.windows(2).all(|w| w[1] > w[0]));
        let status = exchange.get_algo_order(&ack.algo_id).await.unwrap();
        assert_eq!(status.sl_trigger_px, current);
    }
}
