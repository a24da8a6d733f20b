//! Bar persistence and the database-backed `BarStore`

use crate::entity::bars;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine::data::{Bar, BarStore, Timeframe};
use engine::error::EngineError;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Insert bars, updating prices on the `(symbol, timeframe, datetime)` key.
pub async fn upsert_bars(
    db: &DatabaseConnection,
    symbol: &str,
    timeframe: Timeframe,
    bars_in: &[Bar],
) -> Result<()> {
    if bars_in.is_empty() {
        return Ok(());
    }
    let models: Vec<bars::ActiveModel> = bars_in
        .iter()
        .map(|bar| bars::ActiveModel {
            symbol: ActiveValue::Set(symbol.to_string()),
            timeframe: ActiveValue::Set(timeframe.name().to_string()),
            datetime: ActiveValue::Set(bar.timestamp),
            open: ActiveValue::Set(bar.open),
            high: ActiveValue::Set(bar.high),
            low: ActiveValue::Set(bar.low),
            close: ActiveValue::Set(bar.close),
            volume: ActiveValue::Set(bar.volume),
            ..Default::default()
        })
        .collect();

    bars::Entity::insert_many(models)
        .on_conflict(
            OnConflict::columns([
                bars::Column::Symbol,
                bars::Column::Timeframe,
                bars::Column::Datetime,
            ])
            .update_columns([
                bars::Column::Open,
                bars::Column::High,
                bars::Column::Low,
                bars::Column::Close,
                bars::Column::Volume,
            ])
            .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}

pub async fn fetch_range(
    db: &DatabaseConnection,
    symbol: &str,
    timeframe: Timeframe,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<Bar>> {
    let mut query = bars::Entity::find()
        .filter(bars::Column::Symbol.eq(symbol))
        .filter(bars::Column::Timeframe.eq(timeframe.name()));
    if let Some(start) = start {
        query = query.filter(bars::Column::Datetime.gte(start));
    }
    if let Some(end) = end {
        query = query.filter(bars::Column::Datetime.lte(end));
    }
    let rows = query
        .order_by_asc(bars::Column::Datetime)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| Bar::new(row.datetime, row.open, row.high, row.low, row.close, row.volume))
        .collect())
}

/// `BarStore` over the relational bar table, plugged into the data loader.
pub struct DbBarStore {
    db: DatabaseConnection,
}

impl DbBarStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BarStore for DbBarStore {
    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> engine::Result<Vec<Bar>> {
        fetch_range(&self.db, symbol, timeframe, start, end)
            .await
            .map_err(|err| {
                EngineError::Io(std::io::Error::other(format!("bar store: {err}")))
            })
    }
}
