//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "strategy_execution_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u64,
    pub instance_id: u64,
    pub execution_time: DateTimeUtc,
    pub status: String, // "running", "completed", "failed", "cancelled"
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub symbols_processed: i32,
    pub orders_placed: i32,
    pub stops_amended: i32,
    /// JSON blob of per-symbol details.
    #[sea_orm(column_type = "Text", nullable)]
    pub details: Option<String>,
    pub created_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::strategy_instances::Entity",
        from = "Column::InstanceId",
        to = "super::strategy_instances::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    StrategyInstances,
}

impl Related<super::strategy_instances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StrategyInstances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
