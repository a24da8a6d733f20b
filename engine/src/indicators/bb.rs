//! Bollinger Bands

use ta::indicators::BollingerBands;
use ta::Next;

/// Channel selector for the three band outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerChannel {
    Upper,
    Middle,
    Lower,
}

impl BollingerChannel {
    pub fn from_return_index(index: usize) -> BollingerChannel {
        match index {
            1 => BollingerChannel::Middle,
            2 => BollingerChannel::Lower,
            _ => BollingerChannel::Upper,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BollingerChannel::Upper => "upper",
            BollingerChannel::Middle => "middle",
            BollingerChannel::Lower => "lower",
        }
    }
}

/// Upper, middle and lower bands; NaN until a full window is seen.
pub fn calculate_bollinger(
    values: &[f64],
    period: usize,
    std_dev: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let period = period.max(2);
    let mut bb = BollingerBands::new(period, std_dev).unwrap();

    let mut upper = Vec::with_capacity(values.len());
    let mut middle = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());
    for (i, &value) in values.iter().enumerate() {
        let out = bb.next(value);
        if i + 1 >= period {
            upper.push(out.upper);
            middle.push(out.average);
            lower.push(out.lower);
        } else {
            upper.push(f64::NAN);
            middle.push(f64::NAN);
            lower.push(f64::NAN);
        }
    }
    (upper, middle, lower)
}
