//! MACD (Moving Average Convergence Divergence)

use ta::indicators::MovingAverageConvergenceDivergence;
use ta::Next;

/// Channel selector for the three MACD outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdChannel {
    Line,
    Signal,
    Histogram,
}

impl MacdChannel {
    pub fn from_return_index(index: usize) -> MacdChannel {
        match index {
            1 => MacdChannel::Signal,
            2 => MacdChannel::Histogram,
            _ => MacdChannel::Line,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MacdChannel::Line => "line",
            MacdChannel::Signal => "signal",
            MacdChannel::Histogram => "histogram",
        }
    }
}

/// MACD line, signal line and histogram; NaN until the slow EMA and the
/// signal EMA are both warm.
pub fn calculate_macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast = fast.max(1);
    let slow = slow.max(fast + 1);
    let signal = signal.max(1);
    let mut macd = MovingAverageConvergenceDivergence::new(fast, slow, signal).unwrap();
    let warm = slow + signal;

    let mut line = Vec::with_capacity(values.len());
    let mut sig = Vec::with_capacity(values.len());
    let mut hist = Vec::with_capacity(values.len());
    for (i, &value) in values.iter().enumerate() {
        let out = macd.next(value);
        if i + 1 > warm {
            line.push(out.macd);
            sig.push(out.signal);
            hist.push(out.histogram);
        } else {
            line.push(f64::NAN);
            sig.push(f64::NAN);
            hist.push(f64::NAN);
        }
    }
    (line, sig, hist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn histogram_is_line_minus_signal() {
        let values: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.3).sin()).collect();
        let (line, signal, hist) = calculate_macd(&values, 12, 26, 9);
        assert_eq!(line.len(), 80);
        for i in 40..80 {
            assert_relative_eq!(hist[i], line[i] - signal[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn warm_up_rows_are_nan() {
        let values: Vec<f64> = (0..80).map(|i| 100.0 + i as f64).collect();
        let (line, _, _) = calculate_macd(&values, 12, 26, 9);
        assert!(line[..35].iter().all(|v| v.is_nan()));
        assert!(line[35..].iter().all(|v| v.is_finite()));
    }
}
