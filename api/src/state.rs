use crate::tasks::BacktestTasks;
use engine::backtest::BacktestEngine;
use engine::data::DataLoader;
use engine::strategy::{DynamicStrategyStore, StrategyRegistry};
use scheduler::Scheduler;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub engine: Arc<BacktestEngine>,
    pub loader: Arc<DataLoader>,
    pub registry: Arc<StrategyRegistry>,
    pub strategy_store: Arc<DynamicStrategyStore>,
    pub tasks: Arc<BacktestTasks>,
    pub scheduler: Arc<Scheduler>,
}
