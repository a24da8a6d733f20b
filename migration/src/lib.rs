pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_bars;
mod m20250601_000002_create_backtest_results;
mod m20250601_000003_create_strategy_instances;
mod m20250601_000004_create_strategy_execution_records;
mod m20250601_000005_create_spot_algo_order_records;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_bars::Migration),
            Box::new(m20250601_000002_create_backtest_results::Migration),
            Box::new(m20250601_000003_create_strategy_instances::Migration),
            Box::new(m20250601_000004_create_strategy_execution_records::Migration),
            Box::new(m20250601_000005_create_spot_algo_order_records::Migration),
        ]
    }
}
