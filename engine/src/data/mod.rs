//! Market data access: timeframes, bar frames, providers and caching

pub mod bar;
pub mod cache;
pub mod csv_source;
pub mod loader;
pub mod timeframe;

pub use bar::{Bar, BarFrame};
pub use cache::LruCache;
pub use csv_source::CsvBarSource;
pub use loader::{BarStore, DataLoader, TimezoneMode};
pub use timeframe::Timeframe;
