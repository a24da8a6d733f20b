use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BacktestResults::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BacktestResults::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(BacktestResults::Fingerprint).string_len(32).not_null()) // MD5 hex
                    .col(ColumnDef::new(BacktestResults::Symbol).string().not_null())
                    .col(ColumnDef::new(BacktestResults::EntryStrategy).string().not_null())
                    .col(ColumnDef::new(BacktestResults::ExitStrategy).string().not_null())
                    .col(ColumnDef::new(BacktestResults::FilterStrategy).string().null())
                    .col(ColumnDef::new(BacktestResults::Timeframe).string().not_null())
                    .col(ColumnDef::new(BacktestResults::InitialValue).double().not_null())
                    .col(ColumnDef::new(BacktestResults::FinalValue).double().not_null())
                    .col(ColumnDef::new(BacktestResults::TotalReturn).double().not_null())
                    .col(ColumnDef::new(BacktestResults::AnnualReturn).double().not_null())
                    .col(ColumnDef::new(BacktestResults::Sharpe).double().null())
                    .col(ColumnDef::new(BacktestResults::MaxDrawdown).double().not_null())
                    .col(ColumnDef::new(BacktestResults::TotalTrades).integer().not_null())
                    .col(ColumnDef::new(BacktestResults::WinningTrades).integer().not_null())
                    .col(ColumnDef::new(BacktestResults::LosingTrades).integer().not_null())
                    .col(ColumnDef::new(BacktestResults::WinRate).double().not_null())
                    .col(ColumnDef::new(BacktestResults::AvgWin).double().not_null())
                    .col(ColumnDef::new(BacktestResults::AvgLoss).double().not_null())
                    .col(ColumnDef::new(BacktestResults::TotalEntrySignals).integer().not_null())
                    .col(ColumnDef::new(BacktestResults::TotalSellSignals).integer().not_null())
                    .col(ColumnDef::new(BacktestResults::SignalExecutionRate).double().not_null())
                    .col(ColumnDef::new(BacktestResults::DurationDays).double().not_null())
                    .col(ColumnDef::new(BacktestResults::FinishedAt).timestamp().not_null()) // minute precision
                    .col(ColumnDef::new(BacktestResults::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("uq_fingerprint_symbol_finished")
                            .table(BacktestResults::Table)
                            .col(BacktestResults::Fingerprint)
                            .col(BacktestResults::Symbol)
                            .col(BacktestResults::FinishedAt)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BacktestResults::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BacktestResults {
    Table,
    Id,
    Fingerprint,
    Symbol,
    EntryStrategy,
    ExitStrategy,
    FilterStrategy,
    Timeframe,
    InitialValue,
    FinalValue,
    TotalReturn,
    AnnualReturn,
    Sharpe,
    MaxDrawdown,
    TotalTrades,
    WinningTrades,
    LosingTrades,
    WinRate,
    AvgWin,
    AvgLoss,
    TotalEntrySignals,
    TotalSellSignals,
    SignalExecutionRate,
    DurationDays,
    FinishedAt,
    CreatedAt,
}
