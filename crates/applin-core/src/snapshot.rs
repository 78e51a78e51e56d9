//! Persisted-state view of the client.
//!
//! The core produces snapshots and consumes them on startup; writing them to
//! disk is the persistence collaborator's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::page_stack::PageStackState;
use crate::var::VarStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub bool_vars: BTreeMap<String, bool>,
    #[serde(default)]
    pub string_vars: BTreeMap<String, String>,
    /// Bottom to top.
    #[serde(default)]
    pub page_keys: Vec<String>,
}

impl StateSnapshot {
    pub fn capture(vars: &VarStore, stack: &PageStackState) -> Self {
        let (bool_vars, string_vars) = vars.typed_maps();
        Self {
            bool_vars,
            string_vars,
            page_keys: stack.page_keys(),
        }
    }
}
