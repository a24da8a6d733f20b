//! Deterministic in-memory exchange used by tests and dry runs

use crate::data::Bar;
use crate::error::EngineError;
use crate::exchange::client::SpotExchangeApi;
use crate::exchange::types::*;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct MockAlgoOrder {
    pub request: AlgoOrderRequest,
    pub state: OrderState,
    pub sl_trigger_px: Option<f64>,
    pub tp_trigger_px: Option<f64>,
}

#[derive(Debug, Default)]
struct MockState {
    candles: HashMap<(String, String), Vec<Bar>>,
    orders: Vec<OrderRequest>,
    algo_orders: HashMap<String, MockAlgoOrder>,
    /// (algo_id, new stop trigger) in request order
    amendments: Vec<(String, Option<f64>)>,
    next_id: u64,
    fail_next: Option<&'static str>,
}

/// In-memory stand-in for the venue. Candles are seeded by tests; every
/// placed order and amendment is recorded for inspection.
#[derive(Debug, Default)]
pub struct MockExchange {
    state: Mutex<MockState>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_candles(&self, inst_id: &str, bar: &str, bars: Vec<Bar>) {
        let mut state = self.state.lock().unwrap();
        state
            .candles
            .insert((inst_id.to_string(), bar.to_string()), bars);
    }

    /// Make the next call fail with a transient ("transient") or
    /// permanent ("permanent") exchange error.
    pub fn fail_next(&self, kind: &'static str) {
        self.state.lock().unwrap().fail_next = Some(kind);
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().unwrap().orders.clone()
    }

    pub fn algo_order(&self, algo_id: &str) -> Option<MockAlgoOrder> {
        self.state.lock().unwrap().algo_orders.get(algo_id).cloned()
    }

    pub fn algo_orders(&self) -> Vec<(String, MockAlgoOrder)> {
        let state = self.state.lock().unwrap();
        let mut orders: Vec<_> = state
            .algo_orders
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        orders.sort_by(|a, b| a.0.cmp(&b.0));
        orders
    }

    pub fn amendments(&self) -> Vec<(String, Option<f64>)> {
        self.state.lock().unwrap().amendments.clone()
    }

    /// Flip an algo order's state, e.g. to simulate a fill.
    pub fn set_algo_state(&self, algo_id: &str, order_state: OrderState) {
        let mut state = self.state.lock().unwrap();
        if let Some(order) = state.algo_orders.get_mut(algo_id) {
            order.state = order_state;
        }
    }

    fn take_failure(state: &mut MockState) -> Result<()> {
        match state.fail_next.take() {
            Some("permanent") => Err(EngineError::ExchangePermanent(
                "request IP is not whitelisted for this API key".into(),
            )),
            Some(_) => Err(EngineError::ExchangeTransient("injected failure".into())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SpotExchangeApi for MockExchange {
    async fn get_candlesticks(&self, inst_id: &str, bar: &str, limit: usize) -> Result<Vec<Bar>> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        let bars = state
            .candles
            .get(&(inst_id.to_string(), bar.to_string()))
            .cloned()
            .unwrap_or_default();
        let start = bars.len().saturating_sub(limit);
        Ok(bars[start..].to_vec())
    }

    async fn get_history_candlesticks(
        &self,
        inst_id: &str,
        bar: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        let bars = state
            .candles
            .get(&(inst_id.to_string(), bar.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(bars
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect())
    }

    async fn place_order(&self, req: OrderRequest) -> Result<OrderAck> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        state.next_id += 1;
        let ack = OrderAck {
            ord_id: format!("ord-{}", state.next_id),
            cl_ord_id: req.cl_ord_id.clone(),
        };
        state.orders.push(req);
        Ok(ack)
    }

    async fn place_algo_order(&self, req: AlgoOrderRequest) -> Result<AlgoOrderAck> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        state.next_id += 1;
        let algo_id = format!("algo-{}", state.next_id);
        state.algo_orders.insert(
            algo_id.clone(),
            MockAlgoOrder {
                sl_trigger_px: req.sl_trigger_px,
                tp_trigger_px: req.tp_trigger_px,
                state: OrderState::Live,
                request: req.clone(),
            },
        );
        Ok(AlgoOrderAck {
            algo_id,
            cl_ord_id: req.cl_ord_id,
        })
    }

    async fn amend_order(
        &self,
        _inst_id: &str,
        ord_id: &str,
        _new_sz: Option<f64>,
        _new_px: Option<f64>,
    ) -> Result<OrderAck> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        Ok(OrderAck {
            ord_id: ord_id.to_string(),
            cl_ord_id: String::new(),
        })
    }

    async fn amend_algo_order(
        &self,
        _inst_id: &str,
        algo_id: &str,
        new_sl_trigger_px: Option<f64>,
        new_tp_trigger_px: Option<f64>,
    ) -> Result<AlgoOrderAck> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        let Some(order) = state.algo_orders.get_mut(algo_id) else {
            return Err(EngineError::ExchangeTransient(format!(
                "unknown algo order {}",
                algo_id
            )));
        };
        if let Some(px) = new_sl_trigger_px {
            order.sl_trigger_px = Some(px);
        }
        if let Some(px) = new_tp_trigger_px {
            order.tp_trigger_px = Some(px);
        }
        state.amendments.push((algo_id.to_string(), new_sl_trigger_px));
        Ok(AlgoOrderAck {
            algo_id: algo_id.to_string(),
            cl_ord_id: String::new(),
        })
    }

    async fn get_order(&self, inst_id: &str, ord_id: &str) -> Result<OrderStatus> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        Ok(OrderStatus {
            ord_id: ord_id.to_string(),
            inst_id: inst_id.to_string(),
            state: OrderState::Filled,
            sz: 0.0,
            exec_price: None,
        })
    }

    async fn get_algo_order(&self, algo_id: &str) -> Result<AlgoOrderStatus> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        match state.algo_orders.get(algo_id) {
            Some(order) => Ok(AlgoOrderStatus {
                algo_id: algo_id.to_string(),
                inst_id: order.request.inst_id.clone(),
                state: order.state,
                sz: order.request.sz,
                sl_trigger_px: order.sl_trigger_px,
                tp_trigger_px: order.tp_trigger_px,
                exec_price: None,
            }),
            // Unknown order is reported terminal, mirroring the venue
            None => Ok(AlgoOrderStatus {
                algo_id: algo_id.to_string(),
                inst_id: String::new(),
                state: OrderState::Canceled,
                sz: 0.0,
                sl_trigger_px: None,
                tp_trigger_px: None,
                exec_price: None,
            }),
        }
    }

    async fn cancel_order(&self, _inst_id: &str, _ord_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)
    }

    async fn cancel_algo_order(&self, _inst_id: &str, algo_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        if let Some(order) = state.algo_orders.get_mut(algo_id) {
            order.state = OrderState::Canceled;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(hour: u32, close: f64) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
        Bar::new(ts, close, close + 1.0, close - 1.0, close, 1000.0)
    }

    #[tokio::test]
    async fn candles_respect_limit() {
        let exchange = MockExchange::new();
        exchange.seed_candles("BTC-USDT", "1h", vec![bar(0, 1.0), bar(1, 2.0), bar(2, 3.0)]);
        let bars = exchange.get_candlesticks("BTC-USDT", "1h", 2).await.unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 2.0);
    }

    #[tokio::test]
    async fn algo_amend_updates_trigger() {
        let exchange = MockExchange::new();
        let ack = exchange
            .place_algo_order(AlgoOrderRequest {
                inst_id: "BTC-USDT".into(),
                td_mode: "cash".into(),
                side: OrderSide::Buy,
                ord_type: "oco".into(),
                sz: 1.0,
                tp_trigger_px: Some(102.0),
                tp_ord_px: Some(102.0),
                sl_trigger_px: Some(98.0),
                sl_ord_px: Some(98.0),
                cl_ord_id: "c1".into(),
            })
            .await
            .unwrap();
        exchange
            .amend_algo_order("BTC-USDT", &ack.algo_id, Some(99.0), None)
            .await
            .unwrap();
        let status = exchange.get_algo_order(&ack.algo_id).await.unwrap();
        assert_eq!(status.sl_trigger_px, Some(99.0));
        assert_eq!(exchange.amendments().len(), 1);
    }

    #[tokio::test]
    async fn injected_failures_surface_once() {
        let exchange = MockExchange::new();
        exchange.fail_next("transient");
        assert!(matches!(
            exchange.get_candlesticks("BTC-USDT", "1h", 10).await,
            Err(EngineError::ExchangeTransient(_))
        ));
        assert!(exchange.get_candlesticks("BTC-USDT", "1h", 10).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_algo_order_is_terminal() {
        let exchange = MockExchange::new();
        let status = exchange.get_algo_order("nope").await.unwrap();
        assert_eq!(status.state, OrderState::Canceled);
    }
}
