use anyhow::Result;
use engine::data::DataLoader;
use engine::exchange::OkxRest;
use engine::live::LiveEvaluator;
use engine::strategy::{dynamic, DynamicStrategyStore, StrategyRegistry};
use scheduler::{Executor, Scheduler};
use shared::repo::bar_repo::DbBarStore;
use shared::Config;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let db = shared::get_db_connection(&config.database_url).await?;

    let exchange = Arc::new(OkxRest::new(config.okx_credentials()));
    let loader = Arc::new(
        DataLoader::new(exchange.clone(), &config.data_dir, config.timezone)
            .with_store(Arc::new(DbBarStore::new(db.clone()))),
    );

    let registry = Arc::new(StrategyRegistry::with_builtins());
    let store = DynamicStrategyStore::new(&config.strategies_file);
    let loaded = dynamic::load_persisted(&registry, &store)?;
    info!(builtin = registry.list().len() - loaded, dynamic = loaded, "strategy registry ready");

    let executor = Arc::new(Executor::new(
        db.clone(),
        loader,
        LiveEvaluator::new(registry),
        exchange,
    ));
    let sched = Scheduler::new(db, executor, &config.daily_run_time);
    let recovered = sched.recover().await?;
    info!(jobs = recovered, "scheduler running");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
