//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bars")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u64,
    pub symbol: String,
    pub timeframe: String, // canonical form, e.g. "4h"
    pub datetime: DateTimeUtc,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
