//! Spot algorithmic order records and their lifecycle updates

use crate::entity::spot_algo_order_records;
use anyhow::Result;
use chrono::Utc;
use engine::exchange::OrderState;
use engine::live::OrderPlan;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

pub const STATE_LIVE: &str = "live";

/// Persist a freshly placed OCO entry order.
pub async fn insert_placed(
    db: &DatabaseConnection,
    instance_id: u64,
    plan: &OrderPlan,
    client_order_id: &str,
    venue_order_id: Option<&str>,
    algo_id: Option<&str>,
) -> Result<u64> {
    let record = spot_algo_order_records::ActiveModel {
        strategy_instance_id: ActiveValue::Set(Some(instance_id)),
        symbol: ActiveValue::Set(plan.symbol.clone()),
        client_order_id: ActiveValue::Set(client_order_id.to_string()),
        venue_order_id: ActiveValue::Set(venue_order_id.map(str::to_string)),
        algo_id: ActiveValue::Set(algo_id.map(str::to_string)),
        order_type: ActiveValue::Set("market_buy".to_string()),
        side: ActiveValue::Set("buy".to_string()),
        size: ActiveValue::Set(plan.size),
        price: ActiveValue::Set(plan.entry_price),
        target_price: ActiveValue::Set(Some(plan.take_profit)),
        stop_price: ActiveValue::Set(Some(plan.stop_loss)),
        exec_price: ActiveValue::Set(None),
        state: ActiveValue::Set(STATE_LIVE.to_string()),
        exec_source: ActiveValue::Set("auto".to_string()),
        created_at: ActiveValue::Set(Some(Utc::now())),
        updated_at: ActiveValue::Set(Some(Utc::now())),
        ..Default::default()
    };
    let result = spot_algo_order_records::Entity::insert(record)
        .exec(db)
        .await?;
    Ok(result.last_insert_id)
}

/// A unique client order id, kept short enough for venue limits.
pub fn new_client_order_id() -> String {
    format!("sp{}", Uuid::new_v4().simple())
}

/// The open order for `(instance, symbol)`, if any. At most one is live
/// per pair at a time.
pub async fn find_open(
    db: &DatabaseConnection,
    instance_id: u64,
    symbol: &str,
) -> Result<Option<spot_algo_order_records::Model>> {
    Ok(spot_algo_order_records::Entity::find()
        .filter(spot_algo_order_records::Column::StrategyInstanceId.eq(instance_id))
        .filter(spot_algo_order_records::Column::Symbol.eq(symbol))
        .filter(spot_algo_order_records::Column::State.eq(STATE_LIVE))
        .order_by_desc(spot_algo_order_records::Column::CreatedAt)
        .one(db)
        .await?)
}

/// Record a trailed stop on an open order.
pub async fn update_stop_price(
    db: &DatabaseConnection,
    record_id: u64,
    new_stop: f64,
) -> Result<()> {
    let current = spot_algo_order_records::Entity::find_by_id(record_id)
        .one(db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("order record {} not found", record_id))?;
    let mut update: spot_algo_order_records::ActiveModel = current.into();
    update.stop_price = ActiveValue::Set(Some(new_stop));
    update.updated_at = ActiveValue::Set(Some(Utc::now()));
    spot_algo_order_records::Entity::update(update).exec(db).await?;
    Ok(())
}

/// Sync a record with the state reported by the venue.
pub async fn update_state(
    db: &DatabaseConnection,
    record_id: u64,
    state: OrderState,
    exec_price: Option<f64>,
) -> Result<()> {
    let current = spot_algo_order_records::Entity::find_by_id(record_id)
        .one(db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("order record {} not found", record_id))?;
    let mut update: spot_algo_order_records::ActiveModel = current.into();
    update.state = ActiveValue::Set(state.as_str().to_string());
    if exec_price.is_some() {
        update.exec_price = ActiveValue::Set(exec_price);
    }
    update.updated_at = ActiveValue::Set(Some(Utc::now()));
    spot_algo_order_records::Entity::update(update).exec(db).await?;
    Ok(())
}
