use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StrategyExecutionRecords::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StrategyExecutionRecords::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(StrategyExecutionRecords::InstanceId).big_unsigned().not_null())
                    .col(ColumnDef::new(StrategyExecutionRecords::ExecutionTime).timestamp().not_null())
                    .col(ColumnDef::new(StrategyExecutionRecords::Status).string().not_null())
                    .col(ColumnDef::new(StrategyExecutionRecords::ErrorMessage).text().null())
                    .col(ColumnDef::new(StrategyExecutionRecords::SymbolsProcessed).integer().not_null().default(0))
                    .col(ColumnDef::new(StrategyExecutionRecords::OrdersPlaced).integer().not_null().default(0))
                    .col(ColumnDef::new(StrategyExecutionRecords::StopsAmended).integer().not_null().default(0))
                    .col(ColumnDef::new(StrategyExecutionRecords::Details).text().null())
                    .col(ColumnDef::new(StrategyExecutionRecords::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_execution_records_instance")
                            .from(StrategyExecutionRecords::Table, StrategyExecutionRecords::InstanceId)
                            .to(StrategyInstances::Table, StrategyInstances::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_execution_records_instance_time")
                    .table(StrategyExecutionRecords::Table)
                    .col(StrategyExecutionRecords::InstanceId)
                    .col(StrategyExecutionRecords::ExecutionTime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StrategyExecutionRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StrategyExecutionRecords {
    Table,
    Id,
    InstanceId,
    ExecutionTime,
    Status,
    ErrorMessage,
    SymbolsProcessed,
    OrdersPlaced,
    StopsAmended,
    Details,
    CreatedAt,
}

#[derive(DeriveIden)]
enum StrategyInstances {
    Table,
    Id,
}
