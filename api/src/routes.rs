//! HTTP handlers: a thin layer over the engine and the scheduler

use crate::error::ApiError;
use crate::state::AppState;
use crate::tasks::TaskStatus;
use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use engine::backtest::BacktestConfig;
use engine::strategy::{dynamic, DynamicStrategyDef, StrategyRole};
use serde_json::{json, Value};
use shared::repo::{execution_repo, instance_repo};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/backtest", post(submit_backtest))
        .route("/backtest/:config_key", get(backtest_status))
        .route("/backtest/:config_key", delete(cancel_backtest))
        .route("/strategies", get(list_strategies))
        .route("/strategies", post(register_strategy))
        .route("/symbols", get(list_symbols))
        .route("/strategy-instance/create", post(create_instance))
        .route("/strategy-instance/:id/start", post(start_instance))
        .route("/strategy-instance/:id/stop", post(stop_instance))
        .route("/strategy-instance/:id/pause", post(pause_instance))
        .route("/strategy-instance/:id/resume", post(resume_instance))
        .route("/strategy-instance/:id/delete", post(delete_instance))
        .route("/strategy-instance/:id/test-execution", post(test_execution))
        .route("/strategy-instance/:id/executions", get(list_executions))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Submit a backtest. A cached fingerprint completes immediately with the
/// stored summary; otherwise the run is offloaded to a background task.
async fn submit_backtest(
    State(state): State<AppState>,
    Json(config): Json<BacktestConfig>,
) -> Result<Json<Value>, ApiError> {
    config.validate()?;
    let fingerprint = config.fingerprint();
    if let Some(summary) = state.engine.cached(&fingerprint) {
        return Ok(Json(json!({
            "config_key": fingerprint,
            "status": "completed",
            "summary": summary,
        })));
    }
    let status = state.tasks.spawn(
        state.engine.clone(),
        state.db.clone(),
        config,
        fingerprint.clone(),
    );
    Ok(Json(json!({ "config_key": fingerprint, "status": status })))
}

async fn backtest_status(
    State(state): State<AppState>,
    Path(config_key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if let Some(summary) = state.engine.cached(&config_key) {
        return Ok(Json(json!({
            "config_key": config_key,
            "status": "completed",
            "summary": summary,
        })));
    }
    match state.tasks.status(&config_key) {
        Some((status, error)) => Ok(Json(json!({
            "config_key": config_key,
            "status": status,
            "error": error,
        }))),
        None => Err(ApiError::not_found(format!(
            "unknown config_key {config_key}"
        ))),
    }
}

async fn cancel_backtest(
    State(state): State<AppState>,
    Path(config_key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.tasks.cancel(&config_key) {
        Ok(Json(json!({
            "config_key": config_key,
            "status": TaskStatus::Cancelled,
        })))
    } else if state.tasks.status(&config_key).is_some() || state.engine.cached(&config_key).is_some()
    {
        Err(ApiError::bad_request("backtest is no longer running"))
    } else {
        Err(ApiError::not_found(format!(
            "unknown config_key {config_key}"
        )))
    }
}

/// All registered strategies, grouped by role.
async fn list_strategies(State(state): State<AppState>) -> Json<Value> {
    let mut grouped = serde_json::Map::new();
    for role in [StrategyRole::Entry, StrategyRole::Exit, StrategyRole::Filter] {
        let metas = state.registry.list_role(role);
        grouped.insert(role.as_str().to_string(), json!(metas));
    }
    Json(Value::Object(grouped))
}

async fn register_strategy(
    State(state): State<AppState>,
    Json(mut def): Json<DynamicStrategyDef>,
) -> Result<Json<Value>, ApiError> {
    def.created_at = Utc::now();
    dynamic::register_dynamic(&state.registry, &state.strategy_store, &def)?;
    Ok(Json(json!({ "name": def.name, "role": def.role })))
}

async fn list_symbols(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "symbols": state.loader.list_symbols() }))
}

async fn create_instance(
    State(state): State<AppState>,
    Json(new): Json<instance_repo::NewInstance>,
) -> Result<Json<Value>, ApiError> {
    new.validate().map_err(|err| ApiError::bad_request(err.to_string()))?;
    // referenced strategies must exist before the instance is persisted
    state.registry.lookup(&new.entry_strategy, StrategyRole::Entry)?;
    state.registry.lookup(&new.exit_strategy, StrategyRole::Exit)?;
    if let Some(filter) = &new.filter_strategy {
        state.registry.lookup(filter, StrategyRole::Filter)?;
    }
    let id = instance_repo::create(&state.db, &new)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(json!({ "id": id, "status": "stopped" })))
}

async fn start_instance(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    require_instance(&state, id).await?;
    state.scheduler.start(id).await.map_err(ApiError::from)?;
    Ok(Json(json!({ "id": id, "status": "running" })))
}

async fn stop_instance(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    require_instance(&state, id).await?;
    state.scheduler.stop(id).await.map_err(ApiError::from)?;
    Ok(Json(json!({ "id": id, "status": "stopped" })))
}

async fn pause_instance(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    require_instance(&state, id).await?;
    state.scheduler.pause(id).await.map_err(ApiError::from)?;
    Ok(Json(json!({ "id": id, "status": "paused" })))
}

async fn resume_instance(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    require_instance(&state, id).await?;
    state.scheduler.resume(id).await.map_err(ApiError::from)?;
    Ok(Json(json!({ "id": id, "status": "running" })))
}

async fn delete_instance(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    require_instance(&state, id).await?;
    instance_repo::delete(&state.db, id)
        .await
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}

async fn test_execution(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    require_instance(&state, id).await?;
    state
        .scheduler
        .test_execution(id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(json!({ "id": id, "fired": true })))
}

async fn list_executions(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    require_instance(&state, id).await?;
    let records = execution_repo::list_for_instance(&state.db, id, 100)
        .await
        .map_err(ApiError::from)?;
    let rows: Vec<Value> = records
        .into_iter()
        .map(|record| {
            json!({
                "id": record.id,
                "execution_time": record.execution_time,
                "status": record.status,
                "error_message": record.error_message,
                "symbols_processed": record.symbols_processed,
                "orders_placed": record.orders_placed,
                "stops_amended": record.stops_amended,
                "details": record
                    .details
                    .as_deref()
                    .and_then(|raw| serde_json::from_str::<Value>(raw).ok()),
            })
        })
        .collect();
    Ok(Json(json!({ "instance_id": id, "executions": rows })))
}

async fn require_instance(state: &AppState, id: u64) -> Result<(), ApiError> {
    match instance_repo::find(&state.db, id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(ApiError::not_found(format!("unknown instance {id}"))),
        Err(err) => Err(ApiError::internal(err.to_string())),
    }
}
