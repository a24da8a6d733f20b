use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StrategyInstances::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StrategyInstances::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(StrategyInstances::Name).string().not_null())
                    .col(ColumnDef::new(StrategyInstances::EntryStrategy).string().not_null())
                    .col(ColumnDef::new(StrategyInstances::ExitStrategy).string().not_null())
                    .col(ColumnDef::new(StrategyInstances::FilterStrategy).string().null())
                    .col(ColumnDef::new(StrategyInstances::StrategyParams).text().not_null()) // JSON object
                    .col(ColumnDef::new(StrategyInstances::ScheduleFrequency).string().not_null()) // "5m".."1d"
                    .col(ColumnDef::new(StrategyInstances::Symbols).text().not_null()) // JSON array
                    .col(ColumnDef::new(StrategyInstances::Timeframe).string().not_null())
                    .col(ColumnDef::new(StrategyInstances::EntryPerTrans).double().null())
                    .col(ColumnDef::new(StrategyInstances::LossPerTrans).double().null())
                    .col(ColumnDef::new(StrategyInstances::Commission).double().not_null())
                    .col(ColumnDef::new(StrategyInstances::Status).string().not_null().default("stopped"))
                    .col(ColumnDef::new(StrategyInstances::NextExecutionTime).timestamp().null())
                    .col(ColumnDef::new(StrategyInstances::LastExecutionTime).timestamp().null())
                    .col(ColumnDef::new(StrategyInstances::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(
                        ColumnDef::new(StrategyInstances::UpdatedAt)
                            .timestamp()
                            .default(Expr::cust("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_instances_status")
                    .table(StrategyInstances::Table)
                    .col(StrategyInstances::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StrategyInstances::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StrategyInstances {
    Table,
    Id,
    Name,
    EntryStrategy,
    ExitStrategy,
    FilterStrategy,
    StrategyParams,
    ScheduleFrequency,
    Symbols,
    Timeframe,
    EntryPerTrans,
    LossPerTrans,
    Commission,
    Status,
    NextExecutionTime,
    LastExecutionTime,
    CreatedAt,
    UpdatedAt,
}
