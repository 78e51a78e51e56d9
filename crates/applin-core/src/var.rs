//! Named widget values.
//!
//! Vars are the request parameters of the protocol: a checkbox writes a bool,
//! a text field writes a string, and the page's vars are posted back when the
//! page is polled or an RPC fires. A name keeps one type for its lifetime; a
//! write with the other type is logged and then applied anyway.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::sync::lock;

/// A var value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Bool(bool),
    String(String),
}

impl VarValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
        }
    }

    fn same_type(&self, other: &VarValue) -> bool {
        matches!(
            (self, other),
            (Self::Bool(_), Self::Bool(_)) | (Self::String(_), Self::String(_))
        )
    }
}

/// Mutex-guarded var storage.
#[derive(Debug, Default)]
pub struct VarStore {
    vars: Mutex<BTreeMap<String, VarValue>>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, VarValue>> {
        lock(&self.vars)
    }

    pub fn set(&self, name: &str, value: VarValue) {
        let mut vars = self.lock();
        if let Some(existing) = vars.get(name) {
            if !existing.same_type(&value) {
                tracing::warn!(
                    var = name,
                    old_type = existing.type_name(),
                    new_type = value.type_name(),
                    "var changed type"
                );
            }
        }
        vars.insert(name.to_string(), value);
    }

    pub fn set_bool(&self, name: &str, value: bool) {
        self.set(name, VarValue::Bool(value));
    }

    pub fn set_string(&self, name: &str, value: impl Into<String>) {
        self.set(name, VarValue::String(value.into()));
    }

    pub fn get(&self, name: &str) -> Option<VarValue> {
        self.lock().get(name).cloned()
    }

    /// Bool value of `name`. A string-typed var is logged and reads as `None`.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            VarValue::Bool(b) => Some(b),
            VarValue::String(_) => {
                tracing::warn!(var = name, "expected bool var, found string");
                None
            }
        }
    }

    /// String value of `name`. A bool-typed var is logged and reads as `None`.
    pub fn get_string(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            VarValue::String(s) => Some(s),
            VarValue::Bool(_) => {
                tracing::warn!(var = name, "expected string var, found bool");
                None
            }
        }
    }

    /// Current values of `names`, skipping names that were never written.
    pub fn values_for(&self, names: &[String]) -> Vec<(String, VarValue)> {
        let vars = self.lock();
        names
            .iter()
            .filter_map(|name| vars.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    pub fn apply(&self, updates: Vec<(String, VarValue)>) {
        for (name, value) in updates {
            self.set(&name, value);
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Split view used by the persisted snapshot.
    pub fn typed_maps(&self) -> (BTreeMap<String, bool>, BTreeMap<String, String>) {
        let vars = self.lock();
        let mut bools = BTreeMap::new();
        let mut strings = BTreeMap::new();
        for (name, value) in vars.iter() {
            match value {
                VarValue::Bool(b) => {
                    bools.insert(name.clone(), *b);
                }
                VarValue::String(s) => {
                    strings.insert(name.clone(), s.clone());
                }
            }
        }
        (bools, strings)
    }

    /// Replace every var with the given typed maps.
    pub fn restore(&self, bools: &BTreeMap<String, bool>, strings: &BTreeMap<String, String>) {
        let mut vars = self.lock();
        vars.clear();
        for (name, b) in bools {
            vars.insert(name.clone(), VarValue::Bool(*b));
        }
        for (name, s) in strings {
            vars.insert(name.clone(), VarValue::String(s.clone()));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_typed_values() {
        let store = VarStore::new();
        store.set_bool("agree", true);
        store.set_string("name", "Ada");
        assert_eq!(store.get_bool("agree"), Some(true));
        assert_eq!(store.get_string("name"), Some("Ada".to_string()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn type_mismatch_write_replaces_value() {
        let store = VarStore::new();
        store.set_bool("x", true);
        store.set_string("x", "now a string");
        assert_eq!(store.get("x"), Some(VarValue::String("now a string".into())));
        assert_eq!(store.get_bool("x"), None);
    }

    #[test]
    fn values_for_skips_unknown_names() {
        let store = VarStore::new();
        store.set_string("a", "1");
        let values = store.values_for(&["a".to_string(), "missing".to_string()]);
        assert_eq!(values, vec![("a".to_string(), VarValue::String("1".into()))]);
    }

    #[test]
    fn typed_maps_round_trip_through_restore() {
        let store = VarStore::new();
        store.set_bool("b", false);
        store.set_string("s", "v");
        let (bools, strings) = store.typed_maps();

        let other = VarStore::new();
        other.set_string("stale", "gone");
        other.restore(&bools, &strings);
        assert_eq!(other.get_bool("b"), Some(false));
        assert_eq!(other.get_string("s"), Some("v".into()));
        assert_eq!(other.get("stale"), None);
    }

    #[test]
    fn var_value_serializes_untagged() {
        let json = serde_json::to_string(&VarValue::Bool(true)).unwrap();
        assert_eq!(json, "true");
        let json = serde_json::to_string(&VarValue::String("x".into())).unwrap();
        assert_eq!(json, "\"x\"");
    }
}
