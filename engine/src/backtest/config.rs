//! Backtest configuration and its deterministic fingerprint

use crate::data::Timeframe;
use crate::error::EngineError;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

fn default_initial_cash() -> f64 {
    10_000.0
}

fn default_risk_percent() -> f64 {
    10.0
}

fn default_max_position_fraction() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub entry_strategy: String,
    pub exit_strategy: String,
    #[serde(default)]
    pub filter_strategy: Option<String>,
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
    #[serde(default = "default_risk_percent")]
    pub risk_percent: f64,
    #[serde(default)]
    pub commission: f64,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Lookback used when explicit dates are omitted: `1m`, `3m` or `1y`.
    #[serde(default)]
    pub backtest_period: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Broker cap on a single position as a fraction of cash. Not part of
    /// the configuration identity.
    #[serde(default = "default_max_position_fraction")]
    pub max_position_fraction: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(EngineError::Validation("symbols must not be empty".into()));
        }
        if self.initial_cash <= 0.0 {
            return Err(EngineError::Validation(
                "initial_cash must be positive".into(),
            ));
        }
        if self.risk_percent <= 0.0 || self.risk_percent > 100.0 {
            return Err(EngineError::Validation(
                "risk_percent must be in (0, 100]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.commission) {
            return Err(EngineError::Validation(
                "commission must be in [0, 1]".into(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start >= end {
                return Err(EngineError::Validation(
                    "start_date must precede end_date".into(),
                ));
            }
        }
        if let Some(period) = &self.backtest_period {
            if !matches!(period.as_str(), "1m" | "3m" | "1y") {
                return Err(EngineError::Validation(format!(
                    "unknown backtest_period '{}'",
                    period
                )));
            }
        }
        Ok(())
    }

    /// The `[start, end]` window: explicit dates when given, otherwise a
    /// fixed lookback from `now` (`1m`=30d, `3m`=90d, `1y`=365d).
    pub fn resolve_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            return (start, end);
        }
        let days = match self.backtest_period.as_deref() {
            Some("1m") => 30,
            Some("1y") => 365,
            _ => 90,
        };
        (now - Duration::days(days), now)
    }

    /// MD5 hex of the canonical JSON form. Two configs that differ only in
    /// `description`, `created_at` or symbol order share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut symbols = self.symbols.clone();
        symbols.sort();
        // serde_json maps are BTree-backed, so nested keys serialize sorted
        let canonical = serde_json::json!({
            "entry_strategy": self.entry_strategy,
            "exit_strategy": self.exit_strategy,
            "filter_strategy": self.filter_strategy,
            "symbols": symbols,
            "timeframe": self.timeframe.name(),
            "initial_cash": self.initial_cash,
            "risk_percent": self.risk_percent,
            "commission": self.commission,
            "start_date": self.start_date.map(|d| d.to_rfc3339()),
            "end_date": self.end_date.map(|d| d.to_rfc3339()),
            "parameters": self.parameters,
        });
        let mut hasher = Md5::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BacktestConfig {
        BacktestConfig {
            entry_strategy: "sma_cross".into(),
            exit_strategy: "rsi_overbought".into(),
            filter_strategy: None,
            symbols: vec!["BTC-USDT".into(), "ETH-USDT".into()],
            timeframe: Timeframe::H4,
            initial_cash: 10_000.0,
            risk_percent: 10.0,
            commission: 0.001,
            start_date: None,
            end_date: None,
            backtest_period: Some("3m".into()),
            parameters: serde_json::json!({"fast": 10, "slow": 20}),
            max_position_fraction: 0.5,
            description: "first run".into(),
            created_at: Some(Utc::now()),
        }
    }

    #[test]
    fn fingerprint_ignores_description_created_at_and_symbol_order() {
        let a = config();
        let mut b = config();
        b.symbols.reverse();
        b.description = "totally different".into();
        b.created_at = None;
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_semantic_fields() {
        let a = config();
        let mut b = config();
        b.risk_percent = 20.0;
        assert_ne!(a.fingerprint(), b.fingerprint());
        let mut c = config();
        c.parameters = serde_json::json!({"fast": 12, "slow": 20});
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn fingerprint_survives_a_serde_round_trip() {
        let a = config();
        let json = serde_json::to_string(&a).unwrap();
        let b: BacktestConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn validation_rejects_bad_configs() {
        let mut c = config();
        c.symbols.clear();
        assert!(c.validate().is_err());

        let mut c = config();
        c.risk_percent = 0.0;
        assert!(c.validate().is_err());

        let mut c = config();
        c.risk_percent = 101.0;
        assert!(c.validate().is_err());

        let mut c = config();
        c.commission = 1.5;
        assert!(c.validate().is_err());

        let mut c = config();
        c.start_date = Some(Utc::now());
        c.end_date = Some(Utc::now() - Duration::days(1));
        assert!(c.validate().is_err());

        assert!(config().validate().is_ok());
    }

    #[test]
    fn window_resolution_uses_the_period_map() {
        let now = Utc::now();
        let mut c = config();
        c.backtest_period = Some("1m".into());
        let (start, end) = c.resolve_window(now);
        assert_eq!(end, now);
        assert_eq!((end - start).num_days(), 30);

        c.backtest_period = Some("1y".into());
        assert_eq!((now - c.resolve_window(now).0).num_days(), 365);

        c.backtest_period = None;
        assert_eq!((now - c.resolve_window(now).0).num_days(), 90);
    }
}
