//! Serialized access to the page stack.
//!
//! `mutate_and_notify` is the single seam between "what changed" and "render
//! the change": the dirty flag is drained under the same lock as the mutation,
//! and a render lock held across mutation and render keeps renders in
//! mutation order.

use std::sync::{Arc, Mutex};

use applin_core::page_stack::PageStackState;
use applin_core::spec::PageSpec;

use crate::sync::lock;

/// Receives the ordered page list whenever the stack changed.
pub trait Renderer: Send + Sync {
    fn render(&self, pages: Vec<(String, PageSpec)>);
}

pub struct StateGuard {
    state: Mutex<PageStackState>,
    render_lock: Mutex<()>,
    renderer: Mutex<Option<Arc<dyn Renderer>>>,
}

impl StateGuard {
    pub fn new(state: PageStackState) -> Self {
        Self {
            state: Mutex::new(state),
            render_lock: Mutex::new(()),
            renderer: Mutex::new(None),
        }
    }

    /// Register the renderer and hand it any change not yet rendered.
    pub fn set_renderer(&self, renderer: Arc<dyn Renderer>) {
        *lock(&self.renderer) = Some(renderer);
        self.mutate_and_notify(|_| ());
    }

    pub fn clear_renderer(&self) {
        *lock(&self.renderer) = None;
    }

    /// Run a query under the lock. `f` must not call back into the guard.
    pub fn read_only<R>(&self, f: impl FnOnce(&PageStackState) -> R) -> R {
        let state = lock(&self.state);
        f(&*state)
    }

    /// Run a mutation under the lock, then render once if the stack changed.
    /// Without a renderer the change stays pending. `f` must not call back
    /// into the guard.
    pub fn mutate_and_notify<R>(&self, f: impl FnOnce(&mut PageStackState) -> R) -> R {
        let _render = lock(&self.render_lock);
        let renderer = lock(&self.renderer).clone();
        let (out, update) = {
            let mut state = lock(&self.state);
            let out = f(&mut *state);
            let update = if renderer.is_some() {
                state.stack_specs_for_update()
            } else {
                None
            };
            (out, update)
        };
        if let (Some(renderer), Some(pages)) = (renderer, update) {
            renderer.render(pages);
        }
        out
    }
}
