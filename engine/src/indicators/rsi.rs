//! RSI (Relative Strength Index)

use ta::indicators::RelativeStrengthIndex;
use ta::Next;

/// Relative strength index in `[0, 100]`; NaN for the first `period` rows
/// (RSI needs period + 1 values).
pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut rsi = RelativeStrengthIndex::new(period).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let out = rsi.next(value);
            if i >= period {
                out
            } else {
                f64::NAN
            }
        })
        .collect()
}
