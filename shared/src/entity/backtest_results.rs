//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "backtest_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u64,
    pub fingerprint: String, // MD5 hex of the canonical config
    pub symbol: String,
    pub entry_strategy: String,
    pub exit_strategy: String,
    #[sea_orm(nullable)]
    pub filter_strategy: Option<String>,
    pub timeframe: String,
    pub initial_value: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub annual_return: f64,
    #[sea_orm(nullable)]
    pub sharpe: Option<f64>,
    pub max_drawdown: f64,
    pub total_trades: i32,
    pub winning_trades: i32,
    pub losing_trades: i32,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub total_entry_signals: i32,
    pub total_sell_signals: i32,
    pub signal_execution_rate: f64,
    pub duration_days: f64,
    /// Truncated to the minute; part of the upsert key.
    pub finished_at: DateTimeUtc,
    pub created_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
