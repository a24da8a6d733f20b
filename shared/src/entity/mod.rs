pub mod backtest_results;
pub mod bars;
pub mod spot_algo_order_records;
pub mod strategy_execution_records;
pub mod strategy_instances;
