//! Performance metrics derived from a simulated run

use crate::backtest::{BrokerOutcome, SymbolResult};
use chrono::{DateTime, Utc};

const ANNUALIZATION_DAYS: f64 = 365.0;

/// Build the per-symbol summary from a broker outcome.
pub fn summarize(symbol: &str, outcome: &BrokerOutcome) -> SymbolResult {
    let duration_days = duration_days(&outcome.equity_curve);
    let total_return = if outcome.initial_value > 0.0 {
        outcome.final_value / outcome.initial_value - 1.0
    } else {
        0.0
    };
    let annual_return = if duration_days > 0.0 {
        (1.0 + total_return).powf(ANNUALIZATION_DAYS / duration_days) - 1.0
    } else {
        0.0
    };

    let daily = daily_returns(&outcome.equity_curve);
    let sharpe = sharpe_ratio(&daily);
    let max_drawdown = max_drawdown(&outcome.equity_curve);

    let win_rate = if outcome.total_trades > 0 {
        (outcome.winning_trades as f64 / outcome.total_trades as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let pnls: Vec<f64> = outcome.trades.iter().filter_map(|t| t.pnl).collect();
    let wins: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = pnls.iter().copied().filter(|&p| p <= 0.0).collect();
    let avg_win = mean(&wins);
    let avg_loss = mean(&losses);

    let signal_execution_rate = if outcome.total_entry_signals > 0 {
        (outcome.total_trades as f64 / outcome.total_entry_signals as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };

    SymbolResult {
        symbol: symbol.to_string(),
        initial_value: outcome.initial_value,
        final_value: outcome.final_value,
        total_return,
        annual_return,
        sharpe,
        max_drawdown,
        total_trades: outcome.total_trades,
        winning_trades: outcome.winning_trades,
        losing_trades: outcome.losing_trades,
        win_rate,
        avg_win,
        avg_loss,
        total_entry_signals: outcome.total_entry_signals,
        total_sell_signals: outcome.total_sell_signals,
        signal_execution_rate,
        duration_days,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn duration_days(equity_curve: &[(DateTime<Utc>, f64)]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(first), Some(last)) if last.0 > first.0 => {
            (last.0 - first.0).num_seconds() as f64 / 86_400.0
        }
        _ => 0.0,
    }
}

/// Returns between end-of-day equity snapshots.
fn daily_returns(equity_curve: &[(DateTime<Utc>, f64)]) -> Vec<f64> {
    let mut closes: Vec<f64> = Vec::new();
    let mut last_day = None;
    for &(ts, equity) in equity_curve {
        let day = ts.date_naive();
        if last_day == Some(day) {
            *closes.last_mut().unwrap() = equity;
        } else {
            closes.push(equity);
            last_day = Some(day);
        }
    }
    closes
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Annualized Sharpe over daily returns; None when the deviation is zero
/// or there are fewer than two samples.
fn sharpe_ratio(daily: &[f64]) -> Option<f64> {
    if daily.len() < 2 {
        return None;
    }
    let m = mean(daily);
    let var = daily.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (daily.len() - 1) as f64;
    let std = var.sqrt();
    if std == 0.0 {
        None
    } else {
        Some(m / std * ANNUALIZATION_DAYS.sqrt())
    }
}

fn max_drawdown(equity_curve: &[(DateTime<Utc>, f64)]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &(_, equity) in equity_curve {
        peak = peak.max(equity);
        if peak > 0.0 {
            worst = worst.max((peak - equity) / peak);
        }
    }
    worst.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{Trade, TradeSide};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn curve(values: &[f64]) -> Vec<(DateTime<Utc>, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                (
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i as i64),
                    v,
                )
            })
            .collect()
    }

    fn outcome(equity: &[f64]) -> BrokerOutcome {
        BrokerOutcome {
            trades: Vec::new(),
            equity_curve: curve(equity),
            initial_value: equity[0],
            final_value: *equity.last().unwrap(),
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            total_entry_signals: 0,
            total_sell_signals: 0,
        }
    }

    #[test]
    fn flat_equity_has_no_sharpe() {
        let result = summarize("BTC-USDT", &outcome(&[10_000.0; 10]));
        assert_eq!(result.total_return, 0.0);
        assert_eq!(result.sharpe, None);
        assert_eq!(result.max_drawdown, 0.0);
    }

    #[test]
    fn drawdown_measures_peak_to_trough() {
        let result = summarize("BTC-USDT", &outcome(&[100.0, 120.0, 90.0, 110.0]));
        assert_relative_eq!(result.max_drawdown, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn metric_bounds_hold_for_hostile_curves() {
        let result = summarize("BTC-USDT", &outcome(&[100.0, 0.0, 50.0]));
        assert!((0.0..=1.0).contains(&result.max_drawdown));
        assert!((0.0..=1.0).contains(&result.win_rate));
        assert!((0.0..=1.0).contains(&result.signal_execution_rate));
    }

    #[test]
    fn execution_rate_counts_trades_against_signals() {
        let mut o = outcome(&[10_000.0; 5]);
        o.total_entry_signals = 3;
        o.total_trades = 1;
        o.winning_trades = 1;
        let result = summarize("BTC-USDT", &o);
        assert_relative_eq!(result.signal_execution_rate, 1.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn average_win_and_loss_split_closed_pnls() {
        let mut o = outcome(&[10_000.0; 5]);
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for pnl in [50.0, 150.0, -40.0] {
            o.trades.push(Trade {
                timestamp: ts,
                side: TradeSide::Sell,
                price: 100.0,
                size: 1.0,
                value: 100.0,
                commission: 0.0,
                pnl: Some(pnl),
            });
        }
        let result = summarize("BTC-USDT", &o);
        assert_relative_eq!(result.avg_win, 100.0, epsilon = 1e-9);
        assert_relative_eq!(result.avg_loss, -40.0, epsilon = 1e-9);
    }

    #[test]
    fn annual_return_compounds_over_duration() {
        // 10% over half a year compounds to about 21% annualized
        let mut values = vec![10_000.0];
        values.extend(std::iter::repeat(11_000.0).take(182));
        let result = summarize("BTC-USDT", &outcome(&values));
        assert!(result.annual_return > 0.20 && result.annual_return < 0.22);
    }
}
