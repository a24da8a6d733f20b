//! Process-wide strategy catalog

use crate::error::EngineError;
use crate::strategy::{builtin, StrategyFn, StrategyMeta, StrategyRole, StrategyStatus};
use crate::Result;
use std::collections::HashMap;
use std::sync::RwLock;

struct Registered {
    meta: StrategyMeta,
    func: StrategyFn,
}

/// Thread-safe catalog of strategy functions, keyed by name. Names are
/// unique across roles; lookups resolve only `active` strategies.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: RwLock<HashMap<String, Registered>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in entry/exit/filter set.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for (meta, func) in builtin::all() {
            registry.register(meta, func).ok();
        }
        registry
    }

    pub fn register(&self, meta: StrategyMeta, func: StrategyFn) -> Result<()> {
        if meta.name.trim().is_empty() {
            return Err(EngineError::Validation(
                "strategy name must not be empty".into(),
            ));
        }
        let mut entries = self.entries.write().unwrap();
        if entries.contains_key(&meta.name) {
            return Err(EngineError::Validation(format!(
                "strategy '{}' is already registered",
                meta.name
            )));
        }
        entries.insert(meta.name.clone(), Registered { meta, func });
        Ok(())
    }

    /// Resolve an active strategy of the expected role.
    pub fn lookup(&self, name: &str, role: StrategyRole) -> Result<(StrategyMeta, StrategyFn)> {
        let entries = self.entries.read().unwrap();
        let found = entries
            .get(name)
            .ok_or_else(|| EngineError::UnknownStrategy(name.to_string()))?;
        if found.meta.status != StrategyStatus::Active {
            return Err(EngineError::UnknownStrategy(name.to_string()));
        }
        if found.meta.role != role {
            return Err(EngineError::Validation(format!(
                "strategy '{}' has role {}, expected {}",
                name,
                found.meta.role.as_str(),
                role.as_str()
            )));
        }
        Ok((found.meta.clone(), found.func.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().unwrap().contains_key(name)
    }

    pub fn set_status(&self, name: &str, status: StrategyStatus) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let found = entries
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownStrategy(name.to_string()))?;
        found.meta.status = status;
        Ok(())
    }

    /// All metadata, sorted by role then name.
    pub fn list(&self) -> Vec<StrategyMeta> {
        let entries = self.entries.read().unwrap();
        let mut metas: Vec<StrategyMeta> = entries.values().map(|r| r.meta.clone()).collect();
        metas.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.name.cmp(&b.name)));
        metas
    }

    pub fn list_role(&self, role: StrategyRole) -> Vec<StrategyMeta> {
        self.list().into_iter().filter(|m| m.role == role).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategySide;
    use std::sync::Arc;

    fn noop_meta(name: &str, role: StrategyRole) -> StrategyMeta {
        StrategyMeta {
            name: name.to_string(),
            role,
            side: StrategySide::Long,
            description: String::new(),
            status: StrategyStatus::Active,
        }
    }

    fn noop_fn() -> StrategyFn {
        Arc::new(|_, _| Ok(()))
    }

    #[test]
    fn builtins_are_present() {
        let registry = StrategyRegistry::with_builtins();
        assert!(registry.lookup("sma_cross", StrategyRole::Entry).is_ok());
        assert!(registry.lookup("rsi_overbought", StrategyRole::Exit).is_ok());
        assert!(registry.lookup("adx_trend", StrategyRole::Filter).is_ok());
    }

    #[test]
    fn names_are_unique_across_roles() {
        let registry = StrategyRegistry::new();
        registry
            .register(noop_meta("dup", StrategyRole::Entry), noop_fn())
            .unwrap();
        let err = registry
            .register(noop_meta("dup", StrategyRole::Exit), noop_fn())
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn inactive_strategies_do_not_resolve() {
        let registry = StrategyRegistry::new();
        registry
            .register(noop_meta("paused", StrategyRole::Entry), noop_fn())
            .unwrap();
        registry
            .set_status("paused", StrategyStatus::Inactive)
            .unwrap();
        assert!(matches!(
            registry.lookup("paused", StrategyRole::Entry),
            Err(EngineError::UnknownStrategy(_))
        ));
        assert!(registry.contains("paused"));
    }

    #[test]
    fn role_mismatch_is_a_validation_error() {
        let registry = StrategyRegistry::new();
        registry
            .register(noop_meta("only_entry", StrategyRole::Entry), noop_fn())
            .unwrap();
        assert!(matches!(
            registry.lookup("only_entry", StrategyRole::Exit),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn listing_is_sorted_by_role_then_name() {
        let registry = StrategyRegistry::new();
        registry
            .register(noop_meta("zeta", StrategyRole::Entry), noop_fn())
            .unwrap();
        registry
            .register(noop_meta("alpha", StrategyRole::Entry), noop_fn())
            .unwrap();
        registry
            .register(noop_meta("omega", StrategyRole::Filter), noop_fn())
            .unwrap();
        let names: Vec<String> = registry.list().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["alpha", "zeta", "omega"]);
    }
}
