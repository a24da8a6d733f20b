use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SpotAlgoOrderRecords::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SpotAlgoOrderRecords::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::StrategyInstanceId).big_unsigned().null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::Symbol).string().not_null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::ClientOrderId).string().not_null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::VenueOrderId).string().null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::AlgoId).string().null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::OrderType).string().not_null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::Side).string().not_null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::Size).double().not_null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::Price).double().not_null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::TargetPrice).double().null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::StopPrice).double().null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::ExecPrice).double().null())
                    .col(ColumnDef::new(SpotAlgoOrderRecords::State).string().not_null().default("live"))
                    .col(ColumnDef::new(SpotAlgoOrderRecords::ExecSource).string().not_null().default("auto"))
                    .col(ColumnDef::new(SpotAlgoOrderRecords::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(
                        ColumnDef::new(SpotAlgoOrderRecords::UpdatedAt)
                            .timestamp()
                            .default(Expr::cust("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")),
                    )
                    .index(
                        Index::create()
                            .name("uq_client_order_id")
                            .table(SpotAlgoOrderRecords::Table)
                            .col(SpotAlgoOrderRecords::ClientOrderId)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_algo_orders_instance_symbol_state")
                    .table(SpotAlgoOrderRecords::Table)
                    .col(SpotAlgoOrderRecords::StrategyInstanceId)
                    .col(SpotAlgoOrderRecords::Symbol)
                    .col(SpotAlgoOrderRecords::State)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SpotAlgoOrderRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SpotAlgoOrderRecords {
    Table,
    Id,
    StrategyInstanceId,
    Symbol,
    ClientOrderId,
    VenueOrderId,
    AlgoId,
    OrderType,
    Side,
    Size,
    Price,
    TargetPrice,
    StopPrice,
    ExecPrice,
    State,
    ExecSource,
    CreatedAt,
    UpdatedAt,
}
