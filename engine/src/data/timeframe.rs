//! Bar interval enumeration

use crate::error::EngineError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of supported bar intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "3d")]
    D3,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 12] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::D3,
        Timeframe::W1,
    ];

    /// Canonical lowercase name, e.g. `"4h"`
    pub fn name(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::D3 => "3d",
            Timeframe::W1 => "1w",
        }
    }

    /// Upper-cased suffix used in fallback file names, e.g. `"4H"`
    pub fn file_suffix(&self) -> String {
        self.name().to_uppercase()
    }

    /// Interval length in minutes
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H2 => 120,
            Timeframe::H4 => 240,
            Timeframe::H6 => 360,
            Timeframe::H12 => 720,
            Timeframe::D1 => 1440,
            Timeframe::D3 => 4320,
            Timeframe::W1 => 10080,
        }
    }

    /// Interval length in seconds
    pub fn seconds(&self) -> i64 {
        self.minutes() as i64 * 60
    }

    /// True for intervals of a day or longer (session-relabelled bars)
    pub fn is_daily_or_longer(&self) -> bool {
        self.minutes() >= 1440
    }

    /// Resolve any case/separator variant to the canonical entry.
    ///
    /// Accepts `"4h"`, `"4H"`, `"4-h"`, `"4_h"`, `" 4h "` and the like.
    pub fn parse(raw: &str) -> Result<Timeframe> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        for tf in Timeframe::ALL {
            if tf.name() == normalized {
                return Ok(tf);
            }
        }
        Err(EngineError::UnsupportedTimeframe(raw.to_string()))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Timeframe::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_variants() {
        assert_eq!(Timeframe::parse("4h").unwrap(), Timeframe::H4);
        assert_eq!(Timeframe::parse("4H").unwrap(), Timeframe::H4);
        assert_eq!(Timeframe::parse("4-H").unwrap(), Timeframe::H4);
        assert_eq!(Timeframe::parse("4_h").unwrap(), Timeframe::H4);
        assert_eq!(Timeframe::parse(" 1D ").unwrap(), Timeframe::D1);
        assert_eq!(Timeframe::parse("1W").unwrap(), Timeframe::W1);
    }

    #[test]
    fn parse_unknown_fails() {
        assert!(matches!(
            Timeframe::parse("7h"),
            Err(EngineError::UnsupportedTimeframe(_))
        ));
        assert!(Timeframe::parse("").is_err());
    }

    #[test]
    fn minutes_and_suffix() {
        assert_eq!(Timeframe::H4.minutes(), 240);
        assert_eq!(Timeframe::D1.minutes(), 1440);
        assert_eq!(Timeframe::H1.file_suffix(), "1H");
        assert!(Timeframe::D1.is_daily_or_longer());
        assert!(!Timeframe::H12.is_daily_or_longer());
    }

    #[test]
    fn serde_round_trip() {
        let tf: Timeframe = serde_json::from_str("\"15m\"").unwrap();
        assert_eq!(tf, Timeframe::M15);
        assert_eq!(serde_json::to_string(&Timeframe::W1).unwrap(), "\"1w\"");
    }
}
