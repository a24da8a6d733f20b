//! User-defined strategies: validate, compile, persist, re-register

use crate::data::BarFrame;
use crate::error::EngineError;
use crate::strategy::{
    dsl, StrategyContext, StrategyFn, StrategyMeta, StrategyRegistry, StrategyRole, StrategySide,
    StrategyStatus, COL_ENTRY_PRICE, COL_ENTRY_SIG, COL_FILTER_OK, COL_SELL_PRICE, COL_SELL_SIG,
};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// A user-submitted strategy definition. `source` is a condition in the
/// restricted expression language; the compiled function writes the
/// columns its role requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicStrategyDef {
    pub name: String,
    pub role: StrategyRole,
    #[serde(default = "default_side")]
    pub side: StrategySide,
    #[serde(default)]
    pub description: String,
    pub source: String,
    #[serde(default)]
    pub status: StrategyStatus,
    pub created_at: DateTime<Utc>,
}

fn default_side() -> StrategySide {
    StrategySide::Long
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    strategies: Vec<DynamicStrategyDef>,
}

/// JSON-file persistence for dynamic strategies, reloaded at startup.
#[derive(Debug, Clone)]
pub struct DynamicStrategyStore {
    path: PathBuf,
}

impl DynamicStrategyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load_all(&self) -> Result<Vec<DynamicStrategyDef>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        let file: StoreFile = serde_json::from_str(&raw)?;
        Ok(file.strategies)
    }

    pub fn save(&self, def: &DynamicStrategyDef) -> Result<()> {
        let mut all = self.load_all()?;
        all.retain(|d| d.name != def.name);
        all.push(def.clone());
        all.sort_by(|a, b| a.name.cmp(&b.name));
        let file = StoreFile { strategies: all };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

/// Compile a definition into a strategy function. The condition is parsed
/// once here; the returned closure only evaluates it.
pub fn compile(def: &DynamicStrategyDef) -> Result<StrategyFn> {
    let expr = dsl::parse(&def.source)?;
    let role = def.role;
    Ok(Arc::new(move |frame: &mut BarFrame, _ctx: &StrategyContext| {
        let mask = dsl::evaluate(&expr, frame);
        write_role_columns(frame, role, &mask)
    }))
}

fn write_role_columns(frame: &mut BarFrame, role: StrategyRole, mask: &[bool]) -> Result<()> {
    let closes = frame.closes();
    let sig: Vec<f64> = mask.iter().map(|&m| if m { 1.0 } else { 0.0 }).collect();
    match role {
        StrategyRole::Entry => {
            let price: Vec<f64> = mask
                .iter()
                .zip(closes.iter())
                .map(|(&m, &c)| if m { c } else { 0.0 })
                .collect();
            frame.set_column(COL_ENTRY_SIG, sig)?;
            frame.set_column(COL_ENTRY_PRICE, price)
        }
        StrategyRole::Exit => {
            let price: Vec<f64> = mask
                .iter()
                .zip(closes.iter())
                .map(|(&m, &c)| if m { c } else { 0.0 })
                .collect();
            frame.set_column(COL_SELL_SIG, sig)?;
            frame.set_column(COL_SELL_PRICE, price)
        }
        StrategyRole::Filter => frame.set_column(COL_FILTER_OK, sig),
    }
}

/// Validate, compile, register and persist a new dynamic strategy.
pub fn register_dynamic(
    registry: &StrategyRegistry,
    store: &DynamicStrategyStore,
    def: &DynamicStrategyDef,
) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(EngineError::Validation(
            "strategy name must not be empty".into(),
        ));
    }
    if registry.contains(&def.name) {
        return Err(EngineError::Validation(format!(
            "strategy '{}' is already registered",
            def.name
        )));
    }
    let func = compile(def)?;
    registry.register(
        StrategyMeta {
            name: def.name.clone(),
            role: def.role,
            side: def.side,
            description: def.description.clone(),
            status: def.status,
        },
        func,
    )?;
    store.save(def)?;
    info!(name = %def.name, role = def.role.as_str(), "registered dynamic strategy");
    Ok(())
}

/// Re-register every persisted dynamic strategy. Definitions that no
/// longer compile are skipped with a warning rather than failing startup.
pub fn load_persisted(registry: &StrategyRegistry, store: &DynamicStrategyStore) -> Result<usize> {
    let mut loaded = 0;
    for def in store.load_all()? {
        match compile(&def) {
            Ok(func) => {
                let meta = StrategyMeta {
                    name: def.name.clone(),
                    role: def.role,
                    side: def.side,
                    description: def.description.clone(),
                    status: def.status,
                };
                if registry.register(meta, func).is_ok() {
                    loaded += 1;
                }
            }
            Err(err) => {
                tracing::warn!(name = %def.name, %err, "skipping persisted strategy");
            }
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Bar, Timeframe};
    use chrono::{Duration, TimeZone};

    fn def(name: &str, role: StrategyRole, source: &str) -> DynamicStrategyDef {
        DynamicStrategyDef {
            name: name.to_string(),
            role,
            side: StrategySide::Long,
            description: String::new(),
            source: source.to_string(),
            status: StrategyStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn frame_from_closes(closes: &[f64]) -> BarFrame {
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::hours(i as i64);
                Bar::new(ts, c, c + 0.5, c - 0.5, c, 1000.0)
            })
            .collect();
        BarFrame::new("BTC-USDT", Timeframe::H1, bars)
    }

    #[test]
    fn compiled_entry_writes_signal_and_price() {
        let d = def("breakout", StrategyRole::Entry, "close > 100");
        let func = compile(&d).unwrap();
        let mut f = frame_from_closes(&[95.0, 105.0, 99.0]);
        let params = serde_json::json!({});
        func(&mut f, &StrategyContext::backtest(&params)).unwrap();
        assert_eq!(f.column(COL_ENTRY_SIG).unwrap(), &[0.0, 1.0, 0.0]);
        assert_eq!(f.column(COL_ENTRY_PRICE).unwrap(), &[0.0, 105.0, 0.0]);
    }

    #[test]
    fn invalid_source_is_rejected_before_registration() {
        let registry = StrategyRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let store = DynamicStrategyStore::new(dir.path().join("strategies.json"));
        let d = def("broken", StrategyRole::Entry, "close >");
        assert!(register_dynamic(&registry, &store, &d).is_err());
        assert!(!registry.contains("broken"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn registered_strategies_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = DynamicStrategyStore::new(dir.path().join("strategies.json"));

        let registry = StrategyRegistry::new();
        let d = def("dip", StrategyRole::Entry, "rsi(14) < 30");
        register_dynamic(&registry, &store, &d).unwrap();

        let fresh = StrategyRegistry::new();
        let loaded = load_persisted(&fresh, &store).unwrap();
        assert_eq!(loaded, 1);
        assert!(fresh.lookup("dip", StrategyRole::Entry).is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = StrategyRegistry::with_builtins();
        let dir = tempfile::tempdir().unwrap();
        let store = DynamicStrategyStore::new(dir.path().join("strategies.json"));
        let d = def("sma_cross", StrategyRole::Entry, "close > 100");
        assert!(matches!(
            register_dynamic(&registry, &store, &d),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn save_replaces_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = DynamicStrategyStore::new(dir.path().join("strategies.json"));
        store.save(&def("a", StrategyRole::Entry, "close > 1")).unwrap();
        store.save(&def("a", StrategyRole::Entry, "close > 2")).unwrap();
        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source, "close > 2");
    }
}
