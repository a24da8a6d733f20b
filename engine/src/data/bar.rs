//! OHLCV bar and bar-frame structures

use crate::data::Timeframe;
use crate::error::EngineError;
use crate::Result;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One OHLCV candlestick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// All prices positive and finite, volume non-negative
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
    }

    /// Typical price (HLC/3)
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Ordered sequence of bars for one (symbol, timeframe), indexed by
/// timestamp, plus any derived indicator and signal columns.
///
/// Construction sorts ascending and removes duplicate timestamps, so the
/// index is strictly monotonic for every frame handed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarFrame {
    symbol: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl BarFrame {
    /// Build a frame; invalid bars are dropped, the rest sorted and deduped.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        let mut bars: Vec<Bar> = bars.into_iter().filter(Bar::is_valid).collect();
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
            columns: BTreeMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.open).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    /// Derived column by name
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Derived column, or a zero vector of frame length when absent
    pub fn column_or_zeros(&self, name: &str) -> Vec<f64> {
        self.columns
            .get(name)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.bars.len()])
    }

    /// Attach a derived column; its length must match the frame.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.bars.len() {
            return Err(EngineError::Validation(format!(
                "column '{}' has {} values for a frame of {} bars",
                name,
                values.len(),
                self.bars.len()
            )));
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|k| k.as_str()).collect()
    }

    /// Keep only the rows where `keep` is true, in every column.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.bars.len());
        let mut idx = 0;
        self.bars.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
        for values in self.columns.values_mut() {
            let mut idx = 0;
            values.retain(|_| {
                let k = keep[idx];
                idx += 1;
                k
            });
        }
    }

    /// Restrict the frame to `[start, end]` (inclusive) in place.
    pub fn clip(&mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) {
        let keep: Vec<bool> = self
            .bars
            .iter()
            .map(|b| {
                start.map_or(true, |s| b.timestamp >= s) && end.map_or(true, |e| b.timestamp <= e)
            })
            .collect();
        self.retain_rows(&keep);
    }

    /// Keep only the newest `n` bars.
    pub fn tail(&mut self, n: usize) {
        if self.bars.len() > n {
            let cut = self.bars.len() - n;
            self.bars.drain(..cut);
            for values in self.columns.values_mut() {
                values.drain(..cut);
            }
        }
    }

    /// Stable identity for indicator caching: covers symbol, timeframe,
    /// row count and the first/last timestamps. Derived columns do not
    /// change the identity since indicators read only OHLCV.
    pub fn identity_hash(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.symbol.as_bytes());
        hasher.update(self.timeframe.name().as_bytes());
        hasher.update(self.bars.len().to_le_bytes());
        if let Some(first) = self.bars.first() {
            hasher.update(first.timestamp.timestamp_millis().to_le_bytes());
            hasher.update(first.close.to_le_bytes());
        }
        if let Some(last) = self.bars.last() {
            hasher.update(last.timestamp.timestamp_millis().to_le_bytes());
            hasher.update(last.close.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(ts_min: i64, close: f64) -> Bar {
        let ts = Utc.timestamp_opt(ts_min * 60, 0).unwrap();
        Bar::new(ts, close, close + 1.0, close - 1.0, close, 1000.0)
    }

    #[test]
    fn frame_sorts_and_dedups() {
        let frame = BarFrame::new(
            "BTC-USDT",
            Timeframe::H1,
            vec![bar(120, 101.0), bar(60, 100.0), bar(120, 102.0), bar(180, 103.0)],
        );
        assert_eq!(frame.len(), 3);
        let ts = frame.timestamps();
        assert!(ts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn invalid_bars_dropped() {
        let mut bad = bar(60, 100.0);
        bad.close = -5.0;
        let frame = BarFrame::new("BTC-USDT", Timeframe::H1, vec![bad, bar(120, 101.0)]);
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn column_length_enforced() {
        let mut frame = BarFrame::new("BTC-USDT", Timeframe::H1, vec![bar(60, 1.0), bar(120, 2.0)]);
        assert!(frame.set_column("x", vec![1.0]).is_err());
        assert!(frame.set_column("x", vec![1.0, 2.0]).is_ok());
        assert_eq!(frame.column("x").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn retain_rows_filters_columns_too() {
        let mut frame = BarFrame::new(
            "BTC-USDT",
            Timeframe::H1,
            vec![bar(60, 1.0), bar(120, 2.0), bar(180, 3.0)],
        );
        frame.set_column("sig", vec![0.0, 1.0, 0.0]).unwrap();
        frame.retain_rows(&[false, true, true]);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column("sig").unwrap(), &[1.0, 0.0]);
    }

    #[test]
    fn identity_hash_stable_and_distinct() {
        let a = BarFrame::new("BTC-USDT", Timeframe::H1, vec![bar(60, 1.0), bar(120, 2.0)]);
        let b = BarFrame::new("BTC-USDT", Timeframe::H1, vec![bar(60, 1.0), bar(120, 2.0)]);
        let c = BarFrame::new("ETH-USDT", Timeframe::H1, vec![bar(60, 1.0), bar(120, 2.0)]);
        assert_eq!(a.identity_hash(), b.identity_hash());
        assert_ne!(a.identity_hash(), c.identity_hash());
    }

    #[test]
    fn tail_keeps_newest() {
        let mut frame = BarFrame::new(
            "BTC-USDT",
            Timeframe::H1,
            vec![bar(60, 1.0), bar(120, 2.0), bar(180, 3.0)],
        );
        frame.tail(2);
        assert_eq!(frame.closes(), vec![2.0, 3.0]);
    }
}
