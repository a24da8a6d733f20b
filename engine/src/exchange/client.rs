//! Exchange client contract
//!
//! The core only ever talks to a venue through this trait. The live
//! implementation is [`crate::exchange::OkxRest`]; tests run against
//! [`crate::exchange::MockExchange`].

use crate::data::Bar;
use crate::exchange::types::*;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait SpotExchangeApi: Send + Sync {
    /// Most recent `limit` bars for `inst_id` at interval `bar`
    /// (canonical timeframe name), oldest first.
    async fn get_candlesticks(&self, inst_id: &str, bar: &str, limit: usize) -> Result<Vec<Bar>>;

    /// Historical bars within `[start, end]`, oldest first.
    async fn get_history_candlesticks(
        &self,
        inst_id: &str,
        bar: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>>;

    async fn place_order(&self, req: OrderRequest) -> Result<OrderAck>;

    async fn place_algo_order(&self, req: AlgoOrderRequest) -> Result<AlgoOrderAck>;

    async fn amend_order(
        &self,
        inst_id: &str,
        ord_id: &str,
        new_sz: Option<f64>,
        new_px: Option<f64>,
    ) -> Result<OrderAck>;

    /// Update trigger prices on an existing algorithmic order.
    async fn amend_algo_order(
        &self,
        inst_id: &str,
        algo_id: &str,
        new_sl_trigger_px: Option<f64>,
        new_tp_trigger_px: Option<f64>,
    ) -> Result<AlgoOrderAck>;

    async fn get_order(&self, inst_id: &str, ord_id: &str) -> Result<OrderStatus>;

    /// Order-not-found responses come back as a terminal (canceled) status.
    async fn get_algo_order(&self, algo_id: &str) -> Result<AlgoOrderStatus>;

    async fn cancel_order(&self, inst_id: &str, ord_id: &str) -> Result<()>;

    async fn cancel_algo_order(&self, inst_id: &str, algo_id: &str) -> Result<()>;
}
