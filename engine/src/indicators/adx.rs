//! ADX (Average Directional Index)
//!
//! Wilder-smoothed implementation; the `ta` crate has no ADX.

/// ADX in `[0, 100]` from high/low/close series; NaN for the first
/// `2 * period - 1` rows.
pub fn calculate_adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let len = close.len();
    let period = period.max(1);
    let mut out = vec![f64::NAN; len];
    if len < period * 2 || high.len() != len || low.len() != len {
        return out;
    }

    let mut tr = vec![0.0; len];
    let mut plus_dm = vec![0.0; len];
    let mut minus_dm = vec![0.0; len];
    for i in 1..len {
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
        tr[i] = (high[i] - low[i])
            .max((high[i] - close[i - 1]).abs())
            .max((low[i] - close[i - 1]).abs());
    }

    // Wilder smoothing: seed with the sum of the first window, then
    // smoothed = prev - prev/period + current
    let mut tr_s: f64 = tr[1..=period].iter().sum();
    let mut plus_s: f64 = plus_dm[1..=period].iter().sum();
    let mut minus_s: f64 = minus_dm[1..=period].iter().sum();

    let mut dx = vec![f64::NAN; len];
    for i in period..len {
        if i > period {
            tr_s = tr_s - tr_s / period as f64 + tr[i];
            plus_s = plus_s - plus_s / period as f64 + plus_dm[i];
            minus_s = minus_s - minus_s / period as f64 + minus_dm[i];
        }
        if tr_s > 0.0 {
            let plus_di = 100.0 * plus_s / tr_s;
            let minus_di = 100.0 * minus_s / tr_s;
            let di_sum = plus_di + minus_di;
            dx[i] = if di_sum > 0.0 {
                100.0 * (plus_di - minus_di).abs() / di_sum
            } else {
                0.0
            };
        } else {
            dx[i] = 0.0;
        }
    }

    // ADX seeds with the mean of the first `period` DX values
    let first = period * 2 - 1;
    if first >= len {
        return out;
    }
    let mut adx: f64 = dx[period..=first].iter().sum::<f64>() / period as f64;
    out[first] = adx;
    for i in (first + 1)..len {
        adx = (adx * (period as f64 - 1.0) + dx[i]) / period as f64;
        out[i] = adx;
    }
    out
}
