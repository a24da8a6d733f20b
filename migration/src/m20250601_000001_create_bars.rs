use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bars::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bars::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(Bars::Symbol).string().not_null()) // "BTC-USDT"
                    .col(ColumnDef::new(Bars::Timeframe).string().not_null()) // canonical, e.g. "4h"
                    .col(ColumnDef::new(Bars::Datetime).timestamp().not_null())
                    .col(ColumnDef::new(Bars::Open).double().not_null())
                    .col(ColumnDef::new(Bars::High).double().not_null())
                    .col(ColumnDef::new(Bars::Low).double().not_null())
                    .col(ColumnDef::new(Bars::Close).double().not_null())
                    .col(ColumnDef::new(Bars::Volume).double().not_null())
                    .index(
                        Index::create()
                            .name("uq_symbol_timeframe_datetime")
                            .table(Bars::Table)
                            .col(Bars::Symbol)
                            .col(Bars::Timeframe)
                            .col(Bars::Datetime)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bars::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Bars {
    Table,
    Id,
    Symbol,
    Timeframe,
    Datetime,
    Open,
    High,
    Low,
    Close,
    Volume,
}
