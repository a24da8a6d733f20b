//! End-to-end backtest pipeline tests: seeded exchange data through the
//! loader, strategy composition, broker simulation and the summary cache.

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use engine::backtest::{BacktestConfig, BacktestEngine};
use engine::data::{Bar, BarFrame, DataLoader, Timeframe, TimezoneMode};
use engine::error::EngineError;
use engine::exchange::MockExchange;
use engine::strategy::{
    StrategyFn, StrategyMeta, StrategyRegistry, StrategyRole, StrategySide, StrategyStatus,
    COL_ENTRY_PRICE, COL_ENTRY_SIG, COL_FILTER_OK, COL_SELL_PRICE, COL_SELL_SIG,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

// 149 seeded hourly bars leave 100 rows once the 49 SMA warm-up rows are
// dropped, so strategy indices below always land on the same bars.
const SEEDED_BARS: usize = 149;

fn first_bar() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn flat_bars(count: usize, close: f64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let ts = first_bar() + Duration::hours(i as i64);
            Bar::new(ts, close, close + 1.0, close - 1.0, close, 1000.0)
        })
        .collect()
}

fn set_at(frame: &mut BarFrame, col: &str, index: usize, value: f64) {
    let mut values = frame.column_or_zeros(col);
    if index < values.len() {
        values[index] = value;
    }
    frame.set_column(col, values).unwrap();
}

fn meta(name: &str, role: StrategyRole) -> StrategyMeta {
    StrategyMeta {
        name: name.to_string(),
        role,
        side: StrategySide::Long,
        description: String::new(),
        status: StrategyStatus::Active,
    }
}

/// Registry with deterministic index-based strategies.
fn test_registry() -> Arc<StrategyRegistry> {
    let registry = StrategyRegistry::new();

    let silent: StrategyFn = Arc::new(|_, _| Ok(()));
    registry
        .register(meta("silent_entry", StrategyRole::Entry), silent.clone())
        .unwrap();
    registry
        .register(meta("silent_exit", StrategyRole::Exit), silent)
        .unwrap();

    // one buy at row 10 for 100, one sell at row 20 for 110 (120 for ETH)
    let entry: StrategyFn = Arc::new(|frame, _| {
        set_at(frame, COL_ENTRY_SIG, 10, 1.0);
        set_at(frame, COL_ENTRY_PRICE, 10, 100.0);
        Ok(())
    });
    registry
        .register(meta("fixed_entry", StrategyRole::Entry), entry)
        .unwrap();
    let exit: StrategyFn = Arc::new(|frame, _| {
        let price = if frame.symbol() == "ETH-USDT" { 120.0 } else { 110.0 };
        set_at(frame, COL_SELL_SIG, 20, 1.0);
        set_at(frame, COL_SELL_PRICE, 20, price);
        Ok(())
    });
    registry
        .register(meta("fixed_exit", StrategyRole::Exit), exit)
        .unwrap();

    // ten consecutive buy signals starting at row 10
    let burst: StrategyFn = Arc::new(|frame, _| {
        for i in 10..20 {
            set_at(frame, COL_ENTRY_SIG, i, 1.0);
        }
        Ok(())
    });
    registry
        .register(meta("burst_entry", StrategyRole::Entry), burst)
        .unwrap();

    // passes rows 10..13 only
    let narrow: StrategyFn = Arc::new(|frame, _| {
        let mut ok = vec![0.0; frame.len()];
        for slot in ok.iter_mut().take(13).skip(10) {
            *slot = 1.0;
        }
        frame.set_column(COL_FILTER_OK, ok).unwrap();
        Ok(())
    });
    registry
        .register(meta("narrow_filter", StrategyRole::Filter), narrow)
        .unwrap();

    // entry and exit colliding on row 15 while a position is open
    let colliding: StrategyFn = Arc::new(|frame, _| {
        set_at(frame, COL_ENTRY_SIG, 10, 1.0);
        set_at(frame, COL_ENTRY_SIG, 15, 1.0);
        Ok(())
    });
    registry
        .register(meta("colliding_entry", StrategyRole::Entry), colliding)
        .unwrap();
    let exit_15: StrategyFn = Arc::new(|frame, _| {
        set_at(frame, COL_SELL_SIG, 15, 1.0);
        Ok(())
    });
    registry
        .register(meta("exit_at_15", StrategyRole::Exit), exit_15)
        .unwrap();

    let failing: StrategyFn = Arc::new(|_, _| {
        Err(EngineError::Validation("deliberately broken".into()))
    });
    registry
        .register(meta("failing_entry", StrategyRole::Entry), failing)
        .unwrap();

    Arc::new(registry)
}

fn engine_with(symbols: &[&str]) -> (BacktestEngine, Arc<MockExchange>) {
    let exchange = Arc::new(MockExchange::new());
    for symbol in symbols {
        exchange.seed_candles(symbol, "1h", flat_bars(SEEDED_BARS, 100.0));
    }
    let loader = Arc::new(DataLoader::new(
        exchange.clone(),
        "/nonexistent",
        TimezoneMode::Utc,
    ));
    (BacktestEngine::new(loader, test_registry()), exchange)
}

fn config(entry: &str, exit: &str, symbols: &[&str]) -> BacktestConfig {
    BacktestConfig {
        entry_strategy: entry.into(),
        exit_strategy: exit.into(),
        filter_strategy: None,
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        timeframe: Timeframe::H1,
        initial_cash: 10_000.0,
        risk_percent: 100.0,
        commission: 0.0,
        start_date: Some(first_bar() - Duration::days(1)),
        end_date: Some(first_bar() + Duration::days(30)),
        backtest_period: None,
        parameters: serde_json::json!({}),
        max_position_fraction: 1.0,
        description: String::new(),
        created_at: None,
    }
}

#[tokio::test]
async fn no_signals_leaves_the_account_untouched() {
    let (engine, _) = engine_with(&["BTC-USDT"]);
    let cancel = AtomicBool::new(false);
    let summary = engine
        .run(&config("silent_entry", "silent_exit", &["BTC-USDT"]), &cancel)
        .await
        .unwrap();
    assert_eq!(summary.total_symbols, 1);
    assert_eq!(summary.total_trades, 0);
    let result = &summary.symbol_results[0];
    assert_eq!(result.final_value, result.initial_value);
    assert_eq!(result.total_entry_signals, 0);
}

#[tokio::test]
async fn single_round_trip_returns_ten_percent() {
    let (engine, _) = engine_with(&["BTC-USDT"]);
    let cancel = AtomicBool::new(false);
    let summary = engine
        .run(&config("fixed_entry", "fixed_exit", &["BTC-USDT"]), &cancel)
        .await
        .unwrap();
    assert_eq!(summary.total_trades, 1);
    let result = &summary.symbol_results[0];
    assert_eq!(result.winning_trades, 1);
    assert_relative_eq!(result.total_return, 0.10, epsilon = 1e-9);
    assert_relative_eq!(result.final_value, 11_000.0, epsilon = 1e-6);
}

#[tokio::test]
async fn commission_reduces_the_round_trip_return() {
    let (engine, _) = engine_with(&["BTC-USDT"]);
    let cancel = AtomicBool::new(false);
    let mut cfg = config("fixed_entry", "fixed_exit", &["BTC-USDT"]);
    cfg.commission = 0.001;
    let summary = engine.run(&cfg, &cancel).await.unwrap();
    // 10 charged on the buy notional, 11 on the sell notional
    assert_relative_eq!(
        summary.symbol_results[0].total_return,
        0.0979,
        epsilon = 1e-6
    );
}

#[tokio::test]
async fn exit_wins_when_both_signals_land_on_one_bar() {
    let (engine, _) = engine_with(&["BTC-USDT"]);
    let cancel = AtomicBool::new(false);
    let summary = engine
        .run(&config("colliding_entry", "exit_at_15", &["BTC-USDT"]), &cancel)
        .await
        .unwrap();
    // row 15 closed the position; no second buy happened on that bar
    let result = &summary.symbol_results[0];
    assert_eq!(result.total_trades, 1);
    assert_eq!(result.total_entry_signals, 2);
    assert_eq!(result.total_sell_signals, 1);
}

#[tokio::test]
async fn filter_masks_entry_signals_before_counting() {
    let (engine, _) = engine_with(&["BTC-USDT"]);
    let cancel = AtomicBool::new(false);
    let mut cfg = config("burst_entry", "silent_exit", &["BTC-USDT"]);
    cfg.filter_strategy = Some("narrow_filter".into());
    let summary = engine.run(&cfg, &cancel).await.unwrap();
    // ten raw signals, three survive the filter
    assert_eq!(summary.symbol_results[0].total_entry_signals, 3);

    let unfiltered = engine
        .run(&config("burst_entry", "silent_exit", &["BTC-USDT"]), &cancel)
        .await
        .unwrap();
    assert_eq!(unfiltered.symbol_results[0].total_entry_signals, 10);
}

#[tokio::test]
async fn equivalent_configs_share_one_cached_summary() {
    let (engine, _) = engine_with(&["BTC-USDT", "ETH-USDT"]);
    let cancel = AtomicBool::new(false);
    let cfg = config("fixed_entry", "fixed_exit", &["BTC-USDT", "ETH-USDT"]);
    let first = engine.run(&cfg, &cancel).await.unwrap();
    assert_eq!(engine.cache_len(), 1);

    // the rerun differs only in non-identity fields and short-circuits on
    // the cached fingerprint
    let mut rerun = cfg.clone();
    rerun.symbols.reverse();
    rerun.description = "same thing, reordered".into();
    rerun.created_at = Some(Utc::now());
    let second = engine.run(&rerun, &cancel).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.cache_len(), 1);

    // a semantically different config misses the cache and simulates afresh
    let mut different = cfg.clone();
    different.risk_percent = 50.0;
    let third = engine.run(&different, &cancel).await.unwrap();
    assert_ne!(third.fingerprint, first.fingerprint);
    assert_eq!(engine.cache_len(), 2);
}

#[tokio::test]
async fn aggregate_ranks_symbols_by_return() {
    let (engine, _) = engine_with(&["BTC-USDT", "ETH-USDT"]);
    let cancel = AtomicBool::new(false);
    let summary = engine
        .run(
            &config("fixed_entry", "fixed_exit", &["BTC-USDT", "ETH-USDT"]),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(summary.total_symbols, 2);
    assert_eq!(summary.best_symbol.as_deref(), Some("ETH-USDT"));
    assert_eq!(summary.worst_symbol.as_deref(), Some("BTC-USDT"));
    assert_relative_eq!(summary.best_return, 0.20, epsilon = 1e-9);
    assert_relative_eq!(summary.avg_return, 0.15, epsilon = 1e-9);
}

#[tokio::test]
async fn symbols_without_data_are_skipped_not_fatal() {
    let (engine, _) = engine_with(&["BTC-USDT"]);
    let cancel = AtomicBool::new(false);
    let summary = engine
        .run(
            &config("fixed_entry", "fixed_exit", &["BTC-USDT", "NOPE-USDT"]),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(summary.total_symbols, 1);
    assert_eq!(summary.symbol_results[0].symbol, "BTC-USDT");
}

#[tokio::test]
async fn a_crashing_strategy_degrades_to_zero_signals() {
    let (engine, _) = engine_with(&["BTC-USDT"]);
    let cancel = AtomicBool::new(false);
    let summary = engine
        .run(&config("failing_entry", "fixed_exit", &["BTC-USDT"]), &cancel)
        .await
        .unwrap();
    let result = &summary.symbol_results[0];
    assert_eq!(result.total_entry_signals, 0);
    assert_eq!(result.total_trades, 0);
    // the exit strategy still ran and published its signal
    assert_eq!(result.total_sell_signals, 1);
}

#[tokio::test]
async fn unknown_strategies_fail_before_loading_data() {
    let (engine, _) = engine_with(&["BTC-USDT"]);
    let cancel = AtomicBool::new(false);
    let err = engine
        .run(&config("no_such", "fixed_exit", &["BTC-USDT"]), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownStrategy(_)));

    // an entry strategy asked to play the exit role is a validation error
    let err = engine
        .run(&config("fixed_entry", "fixed_entry", &["BTC-USDT"]), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn cancellation_aborts_the_run() {
    let (engine, _) = engine_with(&["BTC-USDT"]);
    let cancel = AtomicBool::new(true);
    let err = engine
        .run(&config("fixed_entry", "fixed_exit", &["BTC-USDT"]), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert_eq!(engine.cache_len(), 0);
}

#[tokio::test]
async fn builtin_pipeline_runs_end_to_end() {
    let exchange = Arc::new(MockExchange::new());
    // a gentle sine around 100 gives the crossover strategies work to do
    let bars: Vec<Bar> = (0..300)
        .map(|i| {
            let ts = first_bar() + Duration::hours(i as i64);
            let price = 100.0 + (i as f64 * 0.15).sin() * 8.0;
            Bar::new(ts, price, price + 1.0, price - 1.0, price, 1000.0)
        })
        .collect();
    exchange.seed_candles("BTC-USDT", "1h", bars);
    let loader = Arc::new(DataLoader::new(
        exchange,
        "/nonexistent",
        TimezoneMode::Utc,
    ));
    let engine = BacktestEngine::new(loader, Arc::new(StrategyRegistry::with_builtins()));

    let cancel = AtomicBool::new(false);
    let mut cfg = config("sma_cross", "rsi_overbought", &["BTC-USDT"]);
    cfg.risk_percent = 10.0;
    cfg.max_position_fraction = 0.5;
    cfg.parameters = serde_json::json!({"fast": 5, "slow": 15});
    let summary = engine.run(&cfg, &cancel).await.unwrap();
    assert_eq!(summary.total_symbols, 1);
    let result = &summary.symbol_results[0];
    assert!(result.max_drawdown >= 0.0 && result.max_drawdown <= 1.0);
    assert!(result.win_rate >= 0.0 && result.win_rate <= 1.0);
    assert!(result.duration_days > 0.0);
}
