mod error;
mod routes;
mod state;
mod tasks;

use anyhow::Result;
use engine::backtest::BacktestEngine;
use engine::data::DataLoader;
use engine::exchange::OkxRest;
use engine::live::LiveEvaluator;
use engine::strategy::{dynamic, DynamicStrategyStore, StrategyRegistry};
use scheduler::{Executor, Scheduler};
use shared::repo::bar_repo::DbBarStore;
use shared::Config;
use state::AppState;
use std::sync::Arc;
use tasks::BacktestTasks;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Starting Spotpilot API server...");

    let config = Config::from_env()?;
    let db = shared::get_db_connection(&config.database_url).await?;

    let exchange = Arc::new(OkxRest::new(config.okx_credentials()));
    let loader = Arc::new(
        DataLoader::new(exchange.clone(), &config.data_dir, config.timezone)
            .with_store(Arc::new(DbBarStore::new(db.clone()))),
    );

    let registry = Arc::new(StrategyRegistry::with_builtins());
    let strategy_store = Arc::new(DynamicStrategyStore::new(&config.strategies_file));
    let loaded = dynamic::load_persisted(&registry, &strategy_store)?;
    info!(dynamic = loaded, "strategy registry ready");

    let engine = Arc::new(BacktestEngine::new(loader.clone(), registry.clone()));
    let executor = Arc::new(Executor::new(
        db.clone(),
        loader.clone(),
        LiveEvaluator::new(registry.clone()),
        exchange,
    ));
    let sched = Arc::new(Scheduler::new(db.clone(), executor, &config.daily_run_time));
    let recovered = sched.recover().await?;
    info!(jobs = recovered, "scheduler jobs recovered");

    let app = routes::router(AppState {
        db,
        engine,
        loader,
        registry,
        strategy_store,
        tasks: Arc::new(BacktestTasks::new()),
        scheduler: sched,
    })
    .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.api_bind).await?;
    info!("API server listening on http://{}", config.api_bind);
    axum::serve(listener, app).await?;

    Ok(())
}
