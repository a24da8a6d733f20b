//! Execution records written around every scheduled fire

use crate::entity::strategy_execution_records;
use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

pub const EXEC_RUNNING: &str = "running";
pub const EXEC_COMPLETED: &str = "completed";
pub const EXEC_FAILED: &str = "failed";

/// Counters accumulated over one fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionTotals {
    pub symbols_processed: i32,
    pub orders_placed: i32,
    pub stops_amended: i32,
}

pub async fn create_running(db: &DatabaseConnection, instance_id: u64) -> Result<u64> {
    let record = strategy_execution_records::ActiveModel {
        instance_id: ActiveValue::Set(instance_id),
        execution_time: ActiveValue::Set(Utc::now()),
        status: ActiveValue::Set(EXEC_RUNNING.to_string()),
        error_message: ActiveValue::Set(None),
        symbols_processed: ActiveValue::Set(0),
        orders_placed: ActiveValue::Set(0),
        stops_amended: ActiveValue::Set(0),
        details: ActiveValue::Set(None),
        created_at: ActiveValue::Set(Some(Utc::now())),
        ..Default::default()
    };
    let result = strategy_execution_records::Entity::insert(record)
        .exec(db)
        .await?;
    Ok(result.last_insert_id)
}

pub async fn mark_completed(
    db: &DatabaseConnection,
    record_id: u64,
    totals: ExecutionTotals,
    details: Option<serde_json::Value>,
) -> Result<()> {
    finish(db, record_id, EXEC_COMPLETED, None, totals, details).await
}

pub async fn mark_failed(
    db: &DatabaseConnection,
    record_id: u64,
    error: &str,
    totals: ExecutionTotals,
) -> Result<()> {
    finish(db, record_id, EXEC_FAILED, Some(error.to_string()), totals, None).await
}

async fn finish(
    db: &DatabaseConnection,
    record_id: u64,
    status: &str,
    error_message: Option<String>,
    totals: ExecutionTotals,
    details: Option<serde_json::Value>,
) -> Result<()> {
    let current = strategy_execution_records::Entity::find_by_id(record_id)
        .one(db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("execution record {} not found", record_id))?;
    let mut update: strategy_execution_records::ActiveModel = current.into();
    update.status = ActiveValue::Set(status.to_string());
    update.error_message = ActiveValue::Set(error_message);
    update.symbols_processed = ActiveValue::Set(totals.symbols_processed);
    update.orders_placed = ActiveValue::Set(totals.orders_placed);
    update.stops_amended = ActiveValue::Set(totals.stops_amended);
    update.details = ActiveValue::Set(details.map(|d| d.to_string()));
    strategy_execution_records::Entity::update(update)
        .exec(db)
        .await?;
    Ok(())
}

pub async fn list_for_instance(
    db: &DatabaseConnection,
    instance_id: u64,
    limit: u64,
) -> Result<Vec<strategy_execution_records::Model>> {
    use sea_orm::QuerySelect;
    let rows = strategy_execution_records::Entity::find()
        .filter(strategy_execution_records::Column::InstanceId.eq(instance_id))
        .order_by_desc(strategy_execution_records::Column::ExecutionTime)
        .limit(limit)
        .all(db)
        .await?;
    Ok(rows)
}
