//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "spot_algo_order_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u64,
    #[sea_orm(column_type = "BigUnsigned", nullable)]
    pub strategy_instance_id: Option<u64>,
    pub symbol: String,
    pub client_order_id: String,
    #[sea_orm(nullable)]
    pub venue_order_id: Option<String>,
    #[sea_orm(nullable)]
    pub algo_id: Option<String>,
    pub order_type: String, // "limit_buy", "market_buy", "market_sell", "stop_loss"
    pub side: String,       // "buy" or "sell"
    pub size: f64,
    pub price: f64,
    /// Attached take-profit trigger.
    #[sea_orm(nullable)]
    pub target_price: Option<f64>,
    /// Attached stop-loss trigger; amended upward as the stop trails.
    #[sea_orm(nullable)]
    pub stop_price: Option<f64>,
    #[sea_orm(nullable)]
    pub exec_price: Option<f64>,
    pub state: String,       // "live", "filled", "canceled", "failed"
    pub exec_source: String, // "auto" or "manual"
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
