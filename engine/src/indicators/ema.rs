//! EMA (Exponential Moving Average)

use ta::indicators::ExponentialMovingAverage;
use ta::Next;

/// Exponential moving average; NaN until `period` values are seen.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut ema = ExponentialMovingAverage::new(period).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let out = ema.next(value);
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
    fn warm_up_then_smoothed() {
        let values = [10.0, 10.0, 10.0, 10.0, 20.0];
        let out = calculate_ema(&values, 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        // constant input converges to the constant
        assert_relative_eq!(out[3], 10.0);
        // the jump pulls the average up but not all the way
        assert!(out[4] > 10.0 && out[4] < 20.0);
    }
}
