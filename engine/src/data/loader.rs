//! Bar frame retrieval with provider fallback and caching

use crate::data::{Bar, BarFrame, CsvBarSource, LruCache, Timeframe};
use crate::exchange::SpotExchangeApi;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Frames below this row count are not worth trading on
pub const MIN_USABLE_ROWS: usize = 50;
/// Final-fallback "recent bars" request size
const RECENT_BARS: usize = 300;
/// Hard cap on cached frames
const FRAME_CACHE_CAP: usize = 50;

/// Operator-chosen market session used to relabel daily bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimezoneMode {
    #[default]
    Utc,
    UtcPlus8,
    UtcMinus4,
}

impl TimezoneMode {
    pub fn parse(raw: &str) -> Option<TimezoneMode> {
        match raw.trim().to_uppercase().as_str() {
            "UTC" => Some(TimezoneMode::Utc),
            "UTC+8" => Some(TimezoneMode::UtcPlus8),
            "UTC-4" => Some(TimezoneMode::UtcMinus4),
            _ => None,
        }
    }

    pub fn offset_hours(&self) -> i64 {
        match self {
            TimezoneMode::Utc => 0,
            TimezoneMode::UtcPlus8 => 8,
            TimezoneMode::UtcMinus4 => -4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimezoneMode::Utc => "UTC",
            TimezoneMode::UtcPlus8 => "UTC+8",
            TimezoneMode::UtcMinus4 => "UTC-4",
        }
    }
}

/// Local persistent bar storage; implemented over the database by the
/// `shared` crate so the engine stays free of ORM types.
#[async_trait]
pub trait BarStore: Send + Sync {
    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>>;
}

type CacheKey = (String, Timeframe, Option<i64>, Option<i64>, TimezoneMode);

/// Loads bar frames for `(symbol, timeframe, optional range)`, stopping at
/// the first source that yields enough clean rows:
///
/// 1. exchange historical range query (only when an explicit range is given)
/// 2. local persistent store
/// 3. on-disk CSV fallback file
/// 4. exchange "recent N bars" endpoint
///
/// Unavailable data is an absent value, never an error. Cached frames are
/// returned as defensive copies.
pub struct DataLoader {
    exchange: Arc<dyn SpotExchangeApi>,
    store: Option<Arc<dyn BarStore>>,
    csv: CsvBarSource,
    timezone: TimezoneMode,
    cache: Mutex<LruCache<CacheKey, BarFrame>>,
}

impl DataLoader {
    pub fn new(
        exchange: Arc<dyn SpotExchangeApi>,
        data_dir: impl Into<PathBuf>,
        timezone: TimezoneMode,
    ) -> Self {
        Self {
            exchange,
            store: None,
            csv: CsvBarSource::new(data_dir),
            timezone,
            cache: Mutex::new(LruCache::new(FRAME_CACHE_CAP)),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn BarStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn timezone(&self) -> TimezoneMode {
        self.timezone
    }

    /// Symbols available in the local data layout.
    pub fn list_symbols(&self) -> Vec<String> {
        self.csv.list_symbols()
    }

    /// Resolve a frame; `Err` only for an unsupported timeframe string,
    /// `Ok(None)` when no source could provide enough data.
    pub async fn load(
        &self,
        symbol: &str,
        timeframe: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Option<BarFrame>> {
        let tf = Timeframe::parse(timeframe)?;
        let key: CacheKey = (
            symbol.to_string(),
            tf,
            range.map(|(s, _)| s.timestamp()),
            range.map(|(_, e)| e.timestamp()),
            self.timezone,
        );
        if let Some(frame) = self.cache.lock().unwrap().get(&key) {
            debug!("frame cache hit for {} {}", symbol, tf);
            return Ok(Some(frame));
        }

        let Some(frame) = self.load_uncached(symbol, tf, range).await else {
            return Ok(None);
        };
        self.cache.lock().unwrap().insert(key, frame.clone());
        Ok(Some(frame))
    }

    /// Most recent `limit` bars for the live path.
    pub async fn load_latest(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Option<BarFrame>> {
        let tf = Timeframe::parse(timeframe)?;
        let end = Utc::now();
        let span = Duration::minutes(tf.minutes() as i64 * limit as i64);
        let mut frame = match self.load(symbol, timeframe, Some((end - span, end))).await? {
            Some(frame) => frame,
            None => match self.load(symbol, timeframe, None).await? {
                Some(frame) => frame,
                None => return Ok(None),
            },
        };
        frame.tail(limit);
        Ok(Some(frame))
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }

    async fn load_uncached(
        &self,
        symbol: &str,
        tf: Timeframe,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Option<BarFrame> {
        if let Some((start, end)) = range {
            match self
                .exchange
                .get_history_candlesticks(symbol, tf.name(), start, end)
                .await
            {
                Ok(bars) => {
                    if let Some(frame) = self.build_frame(symbol, tf, bars, range) {
                        return Some(frame);
                    }
                }
                Err(e) => warn!("exchange history query failed for {} {}: {}", symbol, tf, e),
            }
        }

        if let Some(store) = &self.store {
            match store
                .fetch(symbol, tf, range.map(|r| r.0), range.map(|r| r.1))
                .await
            {
                Ok(bars) => {
                    if let Some(frame) = self.build_frame(symbol, tf, bars, range) {
                        return Some(frame);
                    }
                }
                Err(e) => warn!("bar store query failed for {} {}: {}", symbol, tf, e),
            }
        }

        if let Some(bars) = self.csv.load(symbol, tf) {
            if let Some(frame) = self.build_frame(symbol, tf, bars, range) {
                return Some(frame);
            }
        }

        match self
            .exchange
            .get_candlesticks(symbol, tf.name(), RECENT_BARS)
            .await
        {
            Ok(bars) => self.build_frame(symbol, tf, bars, range),
            Err(e) => {
                warn!("recent-bars fallback failed for {} {}: {}", symbol, tf, e);
                None
            }
        }
    }

    /// Clean, relabel and range-clip raw bars; `None` when too few remain.
    fn build_frame(
        &self,
        symbol: &str,
        tf: Timeframe,
        mut bars: Vec<Bar>,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Option<BarFrame> {
        // Daily bars are relabelled to the open of the day in the chosen
        // session; intraday bars keep their venue timestamps.
        let offset = self.timezone.offset_hours();
        if tf.is_daily_or_longer() && offset != 0 {
            for bar in &mut bars {
                bar.timestamp += Duration::hours(offset);
            }
        }
        let mut frame = BarFrame::new(symbol, tf, bars);
        if let Some((start, end)) = range {
            frame.clip(Some(start), Some(end));
        }
        if frame.len() < MIN_USABLE_ROWS {
            debug!(
                "{} {}: {} usable rows, below the {} minimum",
                symbol,
                tf,
                frame.len(),
                MIN_USABLE_ROWS
            );
            return None;
        }
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockExchange;
    use chrono::TimeZone;

    fn hourly_bars(count: usize) -> Vec<Bar> {
        (0..count)
            .map(|i| {
                let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::hours(i as i64);
                let price = 100.0 + i as f64;
                Bar::new(ts, price, price + 1.0, price - 1.0, price + 0.5, 1000.0)
            })
            .collect()
    }

    #[tokio::test]
    async fn recent_fallback_when_no_range() {
        let exchange = Arc::new(MockExchange::new());
        exchange.seed_candles("BTC-USDT", "1h", hourly_bars(80));
        let loader = DataLoader::new(exchange, "/nonexistent", TimezoneMode::Utc);
        let frame = loader.load("BTC-USDT", "1h", None).await.unwrap().unwrap();
        assert_eq!(frame.len(), 80);
    }

    #[tokio::test]
    async fn insufficient_rows_are_absent() {
        let exchange = Arc::new(MockExchange::new());
        exchange.seed_candles("BTC-USDT", "1h", hourly_bars(10));
        let loader = DataLoader::new(exchange, "/nonexistent", TimezoneMode::Utc);
        assert!(loader.load("BTC-USDT", "1h", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unsupported_timeframe_is_an_error() {
        let exchange = Arc::new(MockExchange::new());
        let loader = DataLoader::new(exchange, "/nonexistent", TimezoneMode::Utc);
        assert!(loader.load("BTC-USDT", "7h", None).await.is_err());
    }

    #[tokio::test]
    async fn cache_returns_defensive_copies() {
        let exchange = Arc::new(MockExchange::new());
        exchange.seed_candles("BTC-USDT", "1h", hourly_bars(80));
        let loader = DataLoader::new(exchange, "/nonexistent", TimezoneMode::Utc);
        let mut first = loader.load("BTC-USDT", "1h", None).await.unwrap().unwrap();
        first.set_column("scratch", vec![1.0; first.len()]).unwrap();
        let second = loader.load("BTC-USDT", "1h", None).await.unwrap().unwrap();
        assert!(!second.has_column("scratch"));
    }

    #[tokio::test]
    async fn daily_bars_relabelled_for_session() {
        let exchange = Arc::new(MockExchange::new());
        let bars: Vec<Bar> = (0..60)
            .map(|i| {
                let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::days(i as i64);
                Bar::new(ts, 100.0, 101.0, 99.0, 100.5, 1000.0)
            })
            .collect();
        exchange.seed_candles("BTC-USDT", "1d", bars.clone());
        let loader = DataLoader::new(exchange, "/nonexistent", TimezoneMode::UtcPlus8);
        let frame = loader.load("BTC-USDT", "1d", None).await.unwrap().unwrap();
        assert_eq!(
            frame.bars()[0].timestamp,
            bars[0].timestamp + Duration::hours(8)
        );
    }

    #[tokio::test]
    async fn load_latest_trims_to_limit() {
        let exchange = Arc::new(MockExchange::new());
        exchange.seed_candles("BTC-USDT", "1h", hourly_bars(300));
        let loader = DataLoader::new(exchange, "/nonexistent", TimezoneMode::Utc);
        let frame = loader
            .load_latest("BTC-USDT", "1h", 100)
            .await
            .unwrap()
            .unwrap();
        assert!(frame.len() <= 100);
    }
}
