//! Strategy instance persistence and lifecycle transitions

use crate::entity::strategy_instances;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use engine::live::SizingPolicy;
use sea_orm::{ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};

pub const STATUS_RUNNING: &str = "running";
pub const STATUS_PAUSED: &str = "paused";
pub const STATUS_STOPPED: &str = "stopped";

/// Creation payload for a new instance. Exactly one sizing field must be
/// set; new instances start stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInstance {
    pub name: String,
    pub entry_strategy: String,
    pub exit_strategy: String,
    #[serde(default)]
    pub filter_strategy: Option<String>,
    #[serde(default)]
    pub strategy_params: serde_json::Value,
    pub schedule_frequency: String,
    pub symbols: Vec<String>,
    pub timeframe: String,
    #[serde(default)]
    pub entry_per_trans: Option<f64>,
    #[serde(default)]
    pub loss_per_trans: Option<f64>,
    #[serde(default)]
    pub commission: f64,
}

impl NewInstance {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("instance name must not be empty");
        }
        if self.symbols.is_empty() {
            bail!("symbols must not be empty");
        }
        match (self.entry_per_trans, self.loss_per_trans) {
            (Some(v), None) | (None, Some(v)) if v > 0.0 => {}
            (Some(_), None) | (None, Some(_)) => bail!("sizing amount must be positive"),
            _ => bail!("exactly one of entry_per_trans and loss_per_trans must be set"),
        }
        if !matches!(
            self.schedule_frequency.as_str(),
            "5m" | "15m" | "1h" | "4h" | "1d"
        ) {
            bail!("unknown schedule_frequency '{}'", self.schedule_frequency);
        }
        Ok(())
    }
}

/// Read the sizing policy off a stored instance.
pub fn sizing_policy(model: &strategy_instances::Model) -> Result<SizingPolicy> {
    match (model.entry_per_trans, model.loss_per_trans) {
        (Some(notional), None) => Ok(SizingPolicy::EntryPerTrans(notional)),
        (None, Some(loss)) => Ok(SizingPolicy::LossPerTrans(loss)),
        _ => bail!("instance {} has an invalid sizing configuration", model.id),
    }
}

pub fn instance_symbols(model: &strategy_instances::Model) -> Vec<String> {
    serde_json::from_str(&model.symbols).unwrap_or_default()
}

pub fn instance_params(model: &strategy_instances::Model) -> serde_json::Value {
    serde_json::from_str(&model.strategy_params).unwrap_or(serde_json::Value::Null)
}

pub async fn create(db: &DatabaseConnection, new: &NewInstance) -> Result<u64> {
    new.validate()?;
    let model = strategy_instances::ActiveModel {
        name: ActiveValue::Set(new.name.clone()),
        entry_strategy: ActiveValue::Set(new.entry_strategy.clone()),
        exit_strategy: ActiveValue::Set(new.exit_strategy.clone()),
        filter_strategy: ActiveValue::Set(new.filter_strategy.clone()),
        strategy_params: ActiveValue::Set(new.strategy_params.to_string()),
        schedule_frequency: ActiveValue::Set(new.schedule_frequency.clone()),
        symbols: ActiveValue::Set(serde_json::to_string(&new.symbols)?),
        timeframe: ActiveValue::Set(new.timeframe.clone()),
        entry_per_trans: ActiveValue::Set(new.entry_per_trans),
        loss_per_trans: ActiveValue::Set(new.loss_per_trans),
        commission: ActiveValue::Set(new.commission),
        status: ActiveValue::Set(STATUS_STOPPED.to_string()),
        next_execution_time: ActiveValue::Set(None),
        last_execution_time: ActiveValue::Set(None),
        created_at: ActiveValue::Set(Some(Utc::now())),
        updated_at: ActiveValue::Set(Some(Utc::now())),
        ..Default::default()
    };
    let result = strategy_instances::Entity::insert(model).exec(db).await?;
    Ok(result.last_insert_id)
}

pub async fn find(
    db: &DatabaseConnection,
    id: u64,
) -> Result<Option<strategy_instances::Model>> {
    Ok(strategy_instances::Entity::find_by_id(id).one(db).await?)
}

pub async fn list(db: &DatabaseConnection) -> Result<Vec<strategy_instances::Model>> {
    Ok(strategy_instances::Entity::find().all(db).await?)
}

pub async fn list_running(db: &DatabaseConnection) -> Result<Vec<strategy_instances::Model>> {
    Ok(strategy_instances::Entity::find()
        .filter(strategy_instances::Column::Status.eq(STATUS_RUNNING))
        .all(db)
        .await?)
}

/// Whether `from → to` is a legal lifecycle move.
pub fn transition_allowed(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        (STATUS_STOPPED, STATUS_RUNNING)
            | (STATUS_RUNNING, STATUS_PAUSED)
            | (STATUS_PAUSED, STATUS_RUNNING)
            | (STATUS_RUNNING, STATUS_STOPPED)
            | (STATUS_PAUSED, STATUS_STOPPED)
    )
}

pub async fn set_status(
    db: &DatabaseConnection,
    id: u64,
    status: &str,
    next_execution_time: Option<DateTime<Utc>>,
) -> Result<strategy_instances::Model> {
    let current = find(db, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("instance {} not found", id))?;
    if !transition_allowed(&current.status, status) {
        bail!("cannot move instance {} from {} to {}", id, current.status, status);
    }
    let mut update: strategy_instances::ActiveModel = current.into();
    update.status = ActiveValue::Set(status.to_string());
    update.next_execution_time = ActiveValue::Set(next_execution_time);
    update.updated_at = ActiveValue::Set(Some(Utc::now()));
    Ok(strategy_instances::Entity::update(update).exec(db).await?)
}

/// Re-point the upcoming fire without touching the execution history.
pub async fn set_next_execution(
    db: &DatabaseConnection,
    id: u64,
    next: Option<DateTime<Utc>>,
) -> Result<()> {
    let current = find(db, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("instance {} not found", id))?;
    let mut update: strategy_instances::ActiveModel = current.into();
    update.next_execution_time = ActiveValue::Set(next);
    update.updated_at = ActiveValue::Set(Some(Utc::now()));
    strategy_instances::Entity::update(update).exec(db).await?;
    Ok(())
}

pub async fn record_execution(
    db: &DatabaseConnection,
    id: u64,
    last: DateTime<Utc>,
    next: Option<DateTime<Utc>>,
) -> Result<()> {
    let current = find(db, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("instance {} not found", id))?;
    let mut update: strategy_instances::ActiveModel = current.into();
    update.last_execution_time = ActiveValue::Set(Some(last));
    update.next_execution_time = ActiveValue::Set(next);
    update.updated_at = ActiveValue::Set(Some(Utc::now()));
    strategy_instances::Entity::update(update).exec(db).await?;
    Ok(())
}

/// Only stopped instances may be removed.
pub async fn delete(db: &DatabaseConnection, id: u64) -> Result<()> {
    let current = find(db, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("instance {} not found", id))?;
    if current.status != STATUS_STOPPED {
        bail!("instance {} must be stopped before deletion", id);
    }
    strategy_instances::Entity::delete_by_id(id).exec(db).await?;
    Ok(())
}
