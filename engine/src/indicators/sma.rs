//! SMA (Simple Moving Average)

use ta::indicators::SimpleMovingAverage;
use ta::Next;

/// Simple moving average over `values`; NaN until a full window is seen.
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut sma = SimpleMovingAverage::new(period).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let out = sma.next(value);
            if i + 1 >= period {
                out
            } else {
                f64::NAN
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn warm_up_is_nan_then_exact_mean() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = calculate_sma(&values, 3);
        assert_eq!(out.len(), 5);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_relative_eq!(out[2], 2.0);
        assert_relative_eq!(out[3], 3.0);
        assert_relative_eq!(out[4], 4.0);
    }

    #[test]
    fn period_one_is_identity() {
        let values = [3.0, 1.0, 4.0];
        assert_eq!(calculate_sma(&values, 1), values.to_vec());
    }
}
