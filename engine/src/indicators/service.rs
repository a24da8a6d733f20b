//! On-demand indicator computation with per-frame caching

use crate::data::BarFrame;
use crate::indicators::{
    calculate_adx, calculate_bollinger, calculate_ema, calculate_macd, calculate_rsi,
    calculate_sma, BollingerChannel, MacdChannel,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Computes indicators over a frame and memoizes the result keyed by
/// `(frame identity hash, indicator name, canonicalized params)`.
/// Multi-valued indicators cache every channel on first computation, so
/// selecting another channel never recomputes.
#[derive(Debug, Default)]
pub struct IndicatorService {
    cache: Mutex<HashMap<String, Arc<Vec<f64>>>>,
}

impl IndicatorService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
    }

    pub fn sma(&self, frame: &BarFrame, period: usize) -> Arc<Vec<f64>> {
        let key = Self::key(frame, "sma", &format!("{}", period));
        self.get_or_compute(key, || calculate_sma(&frame.closes(), period))
    }

    pub fn ema(&self, frame: &BarFrame, period: usize) -> Arc<Vec<f64>> {
        let key = Self::key(frame, "ema", &format!("{}", period));
        self.get_or_compute(key, || calculate_ema(&frame.closes(), period))
    }

    pub fn rsi(&self, frame: &BarFrame, period: usize) -> Arc<Vec<f64>> {
        let key = Self::key(frame, "rsi", &format!("{}", period));
        self.get_or_compute(key, || calculate_rsi(&frame.closes(), period))
    }

    pub fn adx(&self, frame: &BarFrame, period: usize) -> Arc<Vec<f64>> {
        let key = Self::key(frame, "adx", &format!("{}", period));
        self.get_or_compute(key, || {
            calculate_adx(&frame.highs(), &frame.lows(), &frame.closes(), period)
        })
    }

    pub fn bollinger(
        &self,
        frame: &BarFrame,
        period: usize,
        std_dev: f64,
        channel: BollingerChannel,
    ) -> Arc<Vec<f64>> {
        let params = format!("{}:{}", period, std_dev);
        let wanted = Self::key(frame, &format!("bb_{}", channel.name()), &params);
        if let Some(cached) = self.cache.lock().unwrap().get(&wanted) {
            return cached.clone();
        }
        let (upper, middle, lower) = calculate_bollinger(&frame.closes(), period, std_dev);
        let mut cache = self.cache.lock().unwrap();
        for (name, values) in [("upper", upper), ("middle", middle), ("lower", lower)] {
            cache.insert(
                Self::key(frame, &format!("bb_{}", name), &params),
                Arc::new(values),
            );
        }
        cache.get(&wanted).cloned().unwrap_or_else(|| Arc::new(vec![]))
    }

    pub fn macd(
        &self,
        frame: &BarFrame,
        fast: usize,
        slow: usize,
        signal: usize,
        channel: MacdChannel,
    ) -> Arc<Vec<f64>> {
        let params = format!("{}:{}:{}", fast, slow, signal);
        let wanted = Self::key(frame, &format!("macd_{}", channel.name()), &params);
        if let Some(cached) = self.cache.lock().unwrap().get(&wanted) {
            return cached.clone();
        }
        let (line, sig, hist) = calculate_macd(&frame.closes(), fast, slow, signal);
        let mut cache = self.cache.lock().unwrap();
        for (name, values) in [("line", line), ("signal", sig), ("histogram", hist)] {
            cache.insert(
                Self::key(frame, &format!("macd_{}", name), &params),
                Arc::new(values),
            );
        }
        cache.get(&wanted).cloned().unwrap_or_else(|| Arc::new(vec![]))
    }

    fn key(frame: &BarFrame, name: &str, params: &str) -> String {
        format!("{}|{}|{}", frame.identity_hash(), name, params)
    }

    fn get_or_compute<F>(&self, key: String, compute: F) -> Arc<Vec<f64>>
    where
        F: FnOnce() -> Vec<f64>,
    {
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return cached.clone();
        }
        let values = Arc::new(compute());
        self.cache.lock().unwrap().insert(key, values.clone());
        values
    }
}
