//! Built-in entry, exit and filter strategies

use crate::data::BarFrame;
use crate::indicators::{
    calculate_adx, calculate_bollinger, calculate_macd, calculate_rsi, calculate_sma,
};
use crate::strategy::{
    StrategyContext, StrategyFn, StrategyMeta, StrategyRole, StrategySide, StrategyStatus,
    COL_ENTRY_PRICE, COL_ENTRY_SIG, COL_FILTER_OK, COL_SELL_PRICE, COL_SELL_SIG, COL_STOP_LOSS,
};
use crate::Result;
use std::sync::Arc;

/// The full built-in catalog: `(meta, function)` pairs.
pub fn all() -> Vec<(StrategyMeta, StrategyFn)> {
    vec![
        entry("sma_cross", "fast SMA crossing above slow SMA", Arc::new(sma_cross)),
        entry("rsi_oversold", "RSI dipping under a floor", Arc::new(rsi_oversold)),
        entry(
            "bollinger_bounce",
            "close touching the lower Bollinger band",
            Arc::new(bollinger_bounce),
        ),
        entry(
            "macd_momentum",
            "MACD histogram turning positive",
            Arc::new(macd_momentum),
        ),
        exit("rsi_overbought", "RSI rising over a ceiling", Arc::new(rsi_overbought)),
        exit(
            "sma_cross_down",
            "fast SMA crossing below slow SMA",
            Arc::new(sma_cross_down),
        ),
        exit(
            "trailing_stop",
            "close falling under a trailing high-water stop",
            Arc::new(trailing_stop),
        ),
        filter("adx_trend", "ADX above a trend-strength floor", Arc::new(adx_trend)),
        filter(
            "volume_floor",
            "volume above its own moving average",
            Arc::new(volume_floor),
        ),
        filter(
            "regime_sma200",
            "close above the 200-bar SMA",
            Arc::new(regime_sma200),
        ),
    ]
}

fn entry(name: &str, description: &str, func: StrategyFn) -> (StrategyMeta, StrategyFn) {
    (meta(name, StrategyRole::Entry, description), func)
}

fn exit(name: &str, description: &str, func: StrategyFn) -> (StrategyMeta, StrategyFn) {
    (meta(name, StrategyRole::Exit, description), func)
}

fn filter(name: &str, description: &str, func: StrategyFn) -> (StrategyMeta, StrategyFn) {
    (meta(name, StrategyRole::Filter, description), func)
}

fn meta(name: &str, role: StrategyRole, description: &str) -> StrategyMeta {
    StrategyMeta {
        name: name.to_string(),
        role,
        side: StrategySide::Long,
        description: description.to_string(),
        status: StrategyStatus::Active,
    }
}

fn crossed_above(a: &[f64], b: &[f64], i: usize) -> bool {
    i > 0
        && a[i - 1].is_finite()
        && b[i - 1].is_finite()
        && a[i].is_finite()
        && b[i].is_finite()
        && a[i - 1] <= b[i - 1]
        && a[i] > b[i]
}

fn crossed_below(a: &[f64], b: &[f64], i: usize) -> bool {
    crossed_above(b, a, i)
}

fn write_entry(frame: &mut BarFrame, mask: &[bool], stop_pct: f64) -> Result<()> {
    let closes = frame.closes();
    let mut sig = vec![0.0; frame.len()];
    let mut price = vec![0.0; frame.len()];
    let mut stop = vec![0.0; frame.len()];
    for i in 0..frame.len() {
        if mask[i] {
            sig[i] = 1.0;
            price[i] = closes[i];
            stop[i] = closes[i] * (1.0 - stop_pct);
        }
    }
    frame.set_column(COL_ENTRY_SIG, sig)?;
    frame.set_column(COL_ENTRY_PRICE, price)?;
    frame.set_column(COL_STOP_LOSS, stop)
}

fn write_exit(frame: &mut BarFrame, mask: &[bool]) -> Result<()> {
    let closes = frame.closes();
    let mut sig = vec![0.0; frame.len()];
    let mut price = vec![0.0; frame.len()];
    for i in 0..frame.len() {
        if mask[i] {
            sig[i] = 1.0;
            price[i] = closes[i];
        }
    }
    frame.set_column(COL_SELL_SIG, sig)?;
    frame.set_column(COL_SELL_PRICE, price)
}

fn write_filter(frame: &mut BarFrame, mask: &[bool]) -> Result<()> {
    let ok: Vec<f64> = mask.iter().map(|&m| if m { 1.0 } else { 0.0 }).collect();
    frame.set_column(COL_FILTER_OK, ok)
}

fn sma_cross(frame: &mut BarFrame, ctx: &StrategyContext) -> Result<()> {
    let fast = ctx.param_usize("fast", 10);
    let slow = ctx.param_usize("slow", 20);
    let stop_pct = ctx.param_f64("stop_pct", 0.02);
    let closes = frame.closes();
    let fast_sma = calculate_sma(&closes, fast);
    let slow_sma = calculate_sma(&closes, slow);
    let mask: Vec<bool> = (0..frame.len())
        .map(|i| crossed_above(&fast_sma, &slow_sma, i))
        .collect();
    write_entry(frame, &mask, stop_pct)
}

fn rsi_oversold(frame: &mut BarFrame, ctx: &StrategyContext) -> Result<()> {
    let period = ctx.param_usize("period", 14);
    let threshold = ctx.param_f64("threshold", 30.0);
    let stop_pct = ctx.param_f64("stop_pct", 0.02);
    let rsi = calculate_rsi(&frame.closes(), period);
    let mask: Vec<bool> = rsi.iter().map(|&v| v.is_finite() && v < threshold).collect();
    write_entry(frame, &mask, stop_pct)
}

fn bollinger_bounce(frame: &mut BarFrame, ctx: &StrategyContext) -> Result<()> {
    let period = ctx.param_usize("period", 20);
    let std_dev = ctx.param_f64("std_dev", 2.0);
    let stop_pct = ctx.param_f64("stop_pct", 0.02);
    let closes = frame.closes();
    let (_, _, lower) = calculate_bollinger(&closes, period, std_dev);
    let mask: Vec<bool> = closes
        .iter()
        .zip(lower.iter())
        .map(|(&c, &lo)| lo.is_finite() && c <= lo)
        .collect();
    write_entry(frame, &mask, stop_pct)
}

fn macd_momentum(frame: &mut BarFrame, ctx: &StrategyContext) -> Result<()> {
    let fast = ctx.param_usize("fast", 12);
    let slow = ctx.param_usize("slow", 26);
    let signal = ctx.param_usize("signal", 9);
    let stop_pct = ctx.param_f64("stop_pct", 0.02);
    let (_, _, hist) = calculate_macd(&frame.closes(), fast, slow, signal);
    let zero = vec![0.0; frame.len()];
    let mask: Vec<bool> = (0..frame.len())
        .map(|i| crossed_above(&hist, &zero, i))
        .collect();
    write_entry(frame, &mask, stop_pct)
}

fn rsi_overbought(frame: &mut BarFrame, ctx: &StrategyContext) -> Result<()> {
    let period = ctx.param_usize("period", 14);
    let threshold = ctx.param_f64("threshold", 70.0);
    let rsi = calculate_rsi(&frame.closes(), period);
    let mask: Vec<bool> = rsi.iter().map(|&v| v.is_finite() && v > threshold).collect();
    write_exit(frame, &mask)
}

fn sma_cross_down(frame: &mut BarFrame, ctx: &StrategyContext) -> Result<()> {
    let fast = ctx.param_usize("fast", 10);
    let slow = ctx.param_usize("slow", 20);
    let closes = frame.closes();
    let fast_sma = calculate_sma(&closes, fast);
    let slow_sma = calculate_sma(&closes, slow);
    let mask: Vec<bool> = (0..frame.len())
        .map(|i| crossed_below(&fast_sma, &slow_sma, i))
        .collect();
    write_exit(frame, &mask)
}

/// High-water trailing stop. Publishes the trailing level in `stop_loss`
/// so live execution can ratchet the protective order upward.
fn trailing_stop(frame: &mut BarFrame, ctx: &StrategyContext) -> Result<()> {
    let trail_pct = ctx.param_f64("trail_pct", 0.02);
    let closes = frame.closes();
    let mut sig = vec![0.0; frame.len()];
    let mut price = vec![0.0; frame.len()];
    let mut stop = vec![0.0; frame.len()];
    let mut high_water = f64::MIN;
    for i in 0..frame.len() {
        high_water = high_water.max(closes[i]);
        let level = high_water * (1.0 - trail_pct);
        stop[i] = level;
        if closes[i] < level {
            sig[i] = 1.0;
            price[i] = closes[i];
        }
    }
    frame.set_column(COL_SELL_SIG, sig)?;
    frame.set_column(COL_SELL_PRICE, price)?;
    frame.set_column(COL_STOP_LOSS, stop)
}

fn adx_trend(frame: &mut BarFrame, ctx: &StrategyContext) -> Result<()> {
    let period = ctx.param_usize("period", 14);
    let threshold = ctx.param_f64("threshold", 25.0);
    let adx = calculate_adx(&frame.highs(), &frame.lows(), &frame.closes(), period);
    let mask: Vec<bool> = adx.iter().map(|&v| v.is_finite() && v > threshold).collect();
    write_filter(frame, &mask)
}

fn volume_floor(frame: &mut BarFrame, ctx: &StrategyContext) -> Result<()> {
    let period = ctx.param_usize("period", 20);
    let volumes = frame.volumes();
    let avg = calculate_sma(&volumes, period);
    let mask: Vec<bool> = volumes
        .iter()
        .zip(avg.iter())
        .map(|(&v, &a)| a.is_finite() && v > a)
        .collect();
    write_filter(frame, &mask)
}

fn regime_sma200(frame: &mut BarFrame, ctx: &StrategyContext) -> Result<()> {
    let period = ctx.param_usize("period", 200);
    let closes = frame.closes();
    let sma = calculate_sma(&closes, period);
    let mask: Vec<bool> = closes
        .iter()
        .zip(sma.iter())
        .map(|(&c, &s)| s.is_finite() && c > s)
        .collect();
    write_filter(frame, &mask)
}
