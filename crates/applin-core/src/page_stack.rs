//! The navigable stack of pages.
//!
//! Invariants held by every operation:
//! - the stack is never empty (the root page is never popped)
//! - page keys are pairwise distinct
//! - every mutation sets `dirty`; `stack_specs_for_update` drains it

use std::sync::Arc;

use crate::clock::{Clock, LogicalInstant, Token};
use crate::error::ApplinError;
use crate::spec::PageSpec;

/// One page in the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub page_key: String,
    pub spec: PageSpec,
    pub updated_wall_secs: u64,
    pub updated_logical: LogicalInstant,
}

/// Pure page-stack state. Callers serialize access (see `StateGuard` in
/// applin-client).
#[derive(Debug)]
pub struct PageStackState {
    clock: Arc<Clock>,
    entries: Vec<Entry>,
    dirty: bool,
}

impl PageStackState {
    /// Create a stack holding a single root page. Starts dirty so the first
    /// render shows it.
    pub fn new(clock: Arc<Clock>, root_key: impl Into<String>, root_spec: PageSpec) -> Self {
        let mut state = Self {
            clock,
            entries: Vec::new(),
            dirty: true,
        };
        let entry = state.new_entry(root_key.into(), root_spec);
        state.entries.push(entry);
        state
    }

    fn new_entry(&self, page_key: String, spec: PageSpec) -> Entry {
        Entry {
            page_key,
            spec,
            updated_wall_secs: self.clock.now_wall_secs(),
            updated_logical: self.clock.now_logical(),
        }
    }

    fn position(&self, page_key: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.page_key == page_key)
    }

    pub fn push(&mut self, page_key: &str, spec: PageSpec) -> Result<(), ApplinError> {
        if self.contains(page_key) {
            return Err(ApplinError::app(format!(
                "page {page_key:?} is already in the stack"
            )));
        }
        let entry = self.new_entry(page_key.to_string(), spec);
        self.entries.push(entry);
        self.dirty = true;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<(), ApplinError> {
        if self.entries.len() < 2 {
            return Err(ApplinError::app("cannot pop the last page"));
        }
        self.entries.pop();
        self.dirty = true;
        Ok(())
    }

    /// Pop every page above `page_key`. Returns false when the key is not in
    /// the stack.
    pub fn pop_to(&mut self, page_key: &str) -> bool {
        let Some(index) = self.position(page_key) else {
            return false;
        };
        if index + 1 < self.entries.len() {
            self.entries.truncate(index + 1);
            self.dirty = true;
        }
        true
    }

    pub fn replace_all(&mut self, page_key: &str, spec: PageSpec) {
        let entry = self.new_entry(page_key.to_string(), spec);
        self.entries.clear();
        self.entries.push(entry);
        self.dirty = true;
    }

    /// Replace the spec of an existing entry. Returns false (and logs) when the
    /// key is not in the stack.
    pub fn set(&mut self, page_key: &str, spec: PageSpec) -> bool {
        let Some(index) = self.position(page_key) else {
            tracing::debug!(page_key, "set on page not in stack, ignoring");
            return false;
        };
        self.update_at(index, spec);
        true
    }

    /// Like `set`, but drops the write when the entry was updated after
    /// `token` was minted.
    pub fn try_set(&mut self, page_key: &str, token: Token, spec: PageSpec) -> bool {
        let Some(index) = self.position(page_key) else {
            tracing::debug!(page_key, "page left the stack, dropping update");
            return false;
        };
        let updated = self.entries[index].updated_logical;
        if token.is_stale_against(updated) {
            tracing::debug!(
                page_key,
                token = %token.instant(),
                updated = %updated,
                "dropping stale update"
            );
            return false;
        }
        self.update_at(index, spec);
        true
    }

    fn update_at(&mut self, index: usize, spec: PageSpec) {
        let wall = self.clock.now_wall_secs();
        let logical = self.clock.now_logical();
        let entry = &mut self.entries[index];
        entry.spec = spec;
        entry.updated_wall_secs = wall;
        entry.updated_logical = logical;
        self.dirty = true;
    }

    /// Force the next drain to return the stack.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn contains(&self, page_key: &str) -> bool {
        self.position(page_key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_key(&self) -> Option<&str> {
        self.entries.last().map(|e| e.page_key.as_str())
    }

    /// Page keys bottom to top.
    pub fn page_keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.page_key.clone()).collect()
    }

    /// `(key, spec, updated_wall_secs)` bottom to top.
    pub fn entries(&self) -> Vec<(String, PageSpec, u64)> {
        self.entries
            .iter()
            .map(|e| (e.page_key.clone(), e.spec.clone(), e.updated_wall_secs))
            .collect()
    }

    pub fn entry(&self, page_key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.page_key == page_key)
    }

    pub fn spec(&self, page_key: &str) -> Option<&PageSpec> {
        self.entry(page_key).map(|e| &e.spec)
    }

    /// The ordered `(key, spec)` list when something changed since the last
    /// call, clearing the dirty flag.
    pub fn stack_specs_for_update(&mut self) -> Option<Vec<(String, PageSpec)>> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(
            self.entries
                .iter()
                .map(|e| (e.page_key.clone(), e.spec.clone()))
                .collect(),
        )
    }
}
