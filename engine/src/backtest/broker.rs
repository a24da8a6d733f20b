//! Broker simulation: single long position per symbol, no pyramiding

use crate::data::BarFrame;
use crate::strategy::{
    COL_ENTRY_PRICE, COL_ENTRY_SIG, COL_SELL_PRICE, COL_SELL_SIG, COL_STOP_LOSS,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum tradable size; signals that size below this are skipped.
pub const MIN_ORDER_SIZE: f64 = 0.001;

#[derive(Debug, Clone, Copy)]
pub struct BrokerConfig {
    pub initial_cash: f64,
    /// Percent of current cash risked per trade, in (0, 100].
    pub risk_percent: f64,
    /// Commission rate applied to notional on both legs.
    pub commission: f64,
    /// Hard cap on position notional as a fraction of current cash.
    pub max_position_fraction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    pub price: f64,
    pub size: f64,
    pub value: f64,
    pub commission: f64,
    /// Set only on closing sells.
    pub pnl: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Position {
    entry_price: f64,
    size: f64,
}

/// Everything the metrics layer needs from one simulated run.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerOutcome {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
    pub initial_value: f64,
    pub final_value: f64,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub total_entry_signals: u32,
    pub total_sell_signals: u32,
}

/// Compute the size for one entry. Risked cash is `cash × risk%`; a valid
/// published stop converts it to units via the per-unit loss, otherwise the
/// risked cash buys at the entry price directly. The position-notional cap
/// applies in both cases, and sizes under [`MIN_ORDER_SIZE`] are rejected.
pub fn position_size(
    cash: f64,
    entry_price: f64,
    stop_loss: Option<f64>,
    config: &BrokerConfig,
) -> Option<f64> {
    if cash <= 0.0 || entry_price <= 0.0 {
        return None;
    }
    let risked = cash * config.risk_percent / 100.0;
    let mut size = match stop_loss {
        Some(stop) if stop > 0.0 && stop < entry_price => risked / (entry_price - stop),
        _ => risked / entry_price,
    };
    let cap = cash * config.max_position_fraction / entry_price;
    size = size.min(cap);
    if size < MIN_ORDER_SIZE {
        None
    } else {
        Some(size)
    }
}

/// Run the simulation over a signal-annotated frame. Bars are processed in
/// ascending timestamp order; on a bar carrying both signals with an open
/// position, the exit wins and no buy happens that bar.
pub fn simulate(frame: &BarFrame, config: &BrokerConfig) -> BrokerOutcome {
    let len = frame.len();
    let closes = frame.closes();
    let entry_sig = frame.column_or_zeros(COL_ENTRY_SIG);
    let entry_price_col = frame.column_or_zeros(COL_ENTRY_PRICE);
    let sell_sig = frame.column_or_zeros(COL_SELL_SIG);
    let sell_price_col = frame.column_or_zeros(COL_SELL_PRICE);
    let stop_col = frame.has_column(COL_STOP_LOSS).then(|| frame.column_or_zeros(COL_STOP_LOSS));

    let mut cash = config.initial_cash;
    let mut position: Option<Position> = None;
    let mut trades = Vec::new();
    let mut equity_curve = Vec::with_capacity(len);
    let mut winning = 0u32;
    let mut losing = 0u32;
    let mut entry_signals = 0u32;
    let mut sell_signals = 0u32;

    for i in 0..len {
        let ts = frame.bars()[i].timestamp;
        let close = closes[i];
        if entry_sig[i] == 1.0 {
            entry_signals += 1;
        }
        if sell_sig[i] == 1.0 {
            sell_signals += 1;
        }

        if let Some(open) = position {
            if sell_sig[i] == 1.0 {
                let sell_price = if sell_price_col[i] > 0.0 {
                    sell_price_col[i]
                } else {
                    close
                };
                let fees =
                    config.commission * (sell_price * open.size + open.entry_price * open.size);
                let pnl = (sell_price - open.entry_price) * open.size - fees;
                if pnl > 0.0 {
                    winning += 1;
                } else {
                    losing += 1;
                }
                cash += sell_price * open.size * (1.0 - config.commission);
                trades.push(Trade {
                    timestamp: ts,
                    side: TradeSide::Sell,
                    price: sell_price,
                    size: open.size,
                    value: sell_price * open.size,
                    commission: config.commission * sell_price * open.size,
                    pnl: Some(pnl),
                });
                position = None;
            }
        } else if entry_sig[i] == 1.0 {
            let entry_price = if entry_price_col[i] > 0.0 {
                entry_price_col[i]
            } else {
                close
            };
            let stop = stop_col.as_ref().map(|c| c[i]);
            if let Some(size) = position_size(cash, entry_price, stop, config) {
                cash -= entry_price * size * (1.0 + config.commission);
                trades.push(Trade {
                    timestamp: ts,
                    side: TradeSide::Buy,
                    price: entry_price,
                    size,
                    value: entry_price * size,
                    commission: config.commission * entry_price * size,
                    pnl: None,
                });
                position = Some(Position { entry_price, size });
            }
        }

        let equity = cash + position.map(|p| p.size * close).unwrap_or(0.0);
        equity_curve.push((ts, equity));
    }

    // Mark any open position to the last close for accounting; this is not
    // a trade and does not touch the counters.
    let final_value = equity_curve
        .last()
        .map(|&(_, equity)| equity)
        .unwrap_or(config.initial_cash);

    BrokerOutcome {
        total_trades: winning + losing,
        trades,
        equity_curve,
        initial_value: config.initial_cash,
        final_value,
        winning_trades: winning,
        losing_trades: losing,
        total_entry_signals: entry_signals,
        total_sell_signals: sell_signals,
    }
}
