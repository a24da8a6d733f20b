//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "strategy_instances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u64,
    pub name: String,
    pub entry_strategy: String,
    pub exit_strategy: String,
    #[sea_orm(nullable)]
    pub filter_strategy: Option<String>,
    /// JSON object of strategy parameters.
    #[sea_orm(column_type = "Text")]
    pub strategy_params: String,
    pub schedule_frequency: String, // "5m", "15m", "1h", "4h", "1d"
    /// JSON array of instrument ids, processed in declared order.
    #[sea_orm(column_type = "Text")]
    pub symbols: String,
    pub timeframe: String,
    /// Exactly one of the two sizing fields is set.
    #[sea_orm(nullable)]
    pub entry_per_trans: Option<f64>,
    #[sea_orm(nullable)]
    pub loss_per_trans: Option<f64>,
    pub commission: f64,
    pub status: String, // "running", "paused", "stopped"
    pub next_execution_time: Option<DateTimeUtc>,
    pub last_execution_time: Option<DateTimeUtc>,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::strategy_execution_records::Entity")]
    StrategyExecutionRecords,
}

impl Related<super::strategy_execution_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StrategyExecutionRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
