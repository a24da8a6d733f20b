//! Persistent per-symbol backtest results

use crate::entity::backtest_results;
use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use engine::backtest::{BacktestConfig, BacktestSummary, SymbolResult};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Upsert key resolution: completions within the same minute overwrite
/// each other instead of piling up rows.
fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Write one row per symbol for a completed backtest, keyed by
/// `(fingerprint, symbol, finished_at_minute)`.
pub async fn save_summary(
    db: &DatabaseConnection,
    config: &BacktestConfig,
    summary: &BacktestSummary,
    finished_at: DateTime<Utc>,
) -> Result<()> {
    if summary.symbol_results.is_empty() {
        return Ok(());
    }
    let finished_at = truncate_to_minute(finished_at);
    let models: Vec<backtest_results::ActiveModel> = summary
        .symbol_results
        .iter()
        .map(|result| row(config, &summary.fingerprint, result, finished_at))
        .collect();

    backtest_results::Entity::insert_many(models)
        .on_conflict(
            OnConflict::columns([
                backtest_results::Column::Fingerprint,
                backtest_results::Column::Symbol,
                backtest_results::Column::FinishedAt,
            ])
            .update_columns([
                backtest_results::Column::InitialValue,
                backtest_results::Column::FinalValue,
                backtest_results::Column::TotalReturn,
                backtest_results::Column::AnnualReturn,
                backtest_results::Column::Sharpe,
                backtest_results::Column::MaxDrawdown,
                backtest_results::Column::TotalTrades,
                backtest_results::Column::WinningTrades,
                backtest_results::Column::LosingTrades,
                backtest_results::Column::WinRate,
                backtest_results::Column::AvgWin,
                backtest_results::Column::AvgLoss,
                backtest_results::Column::TotalEntrySignals,
                backtest_results::Column::TotalSellSignals,
                backtest_results::Column::SignalExecutionRate,
                backtest_results::Column::DurationDays,
            ])
            .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}

fn row(
    config: &BacktestConfig,
    fingerprint: &str,
    result: &SymbolResult,
    finished_at: DateTime<Utc>,
) -> backtest_results::ActiveModel {
    backtest_results::ActiveModel {
        fingerprint: ActiveValue::Set(fingerprint.to_string()),
        symbol: ActiveValue::Set(result.symbol.clone()),
        entry_strategy: ActiveValue::Set(config.entry_strategy.clone()),
        exit_strategy: ActiveValue::Set(config.exit_strategy.clone()),
        filter_strategy: ActiveValue::Set(config.filter_strategy.clone()),
        timeframe: ActiveValue::Set(config.timeframe.name().to_string()),
        initial_value: ActiveValue::Set(result.initial_value),
        final_value: ActiveValue::Set(result.final_value),
        total_return: ActiveValue::Set(result.total_return),
        annual_return: ActiveValue::Set(result.annual_return),
        sharpe: ActiveValue::Set(result.sharpe),
        max_drawdown: ActiveValue::Set(result.max_drawdown),
        total_trades: ActiveValue::Set(result.total_trades as i32),
        winning_trades: ActiveValue::Set(result.winning_trades as i32),
        losing_trades: ActiveValue::Set(result.losing_trades as i32),
        win_rate: ActiveValue::Set(result.win_rate),
        avg_win: ActiveValue::Set(result.avg_win),
        avg_loss: ActiveValue::Set(result.avg_loss),
        total_entry_signals: ActiveValue::Set(result.total_entry_signals as i32),
        total_sell_signals: ActiveValue::Set(result.total_sell_signals as i32),
        signal_execution_rate: ActiveValue::Set(result.signal_execution_rate),
        duration_days: ActiveValue::Set(result.duration_days),
        finished_at: ActiveValue::Set(finished_at),
        created_at: ActiveValue::Set(Some(Utc::now())),
        ..Default::default()
    }
}

pub async fn find_by_fingerprint(
    db: &DatabaseConnection,
    fingerprint: &str,
) -> Result<Vec<backtest_results::Model>> {
    let rows = backtest_results::Entity::find()
        .filter(backtest_results::Column::Fingerprint.eq(fingerprint))
        .order_by_desc(backtest_results::Column::FinishedAt)
        .order_by_asc(backtest_results::Column::Symbol)
        .all(db)
        .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn minute_truncation_drops_seconds() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 45).unwrap();
        let truncated = truncate_to_minute(ts);
        assert_eq!(truncated, Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap());
    }
}
