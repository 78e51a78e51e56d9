//! A running client.
//!
//! `Session` owns the context, the executor, and the background tasks. All
//! tasks hang off one cancellation token, cancelled by `shutdown` or drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use applin_core::action::ActionSpec;
use applin_core::snapshot::StateSnapshot;
use applin_core::static_pages::LOADING_PAGE_KEY;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::ClientContext;
use crate::executor::ActionExecutor;
use crate::foreground::ForegroundPoller;
use crate::persistence::{spawn_writer, SnapshotStore};
use crate::poller::BackgroundPoller;
use crate::state_guard::Renderer;
use crate::sync::lock;

pub struct Session {
    ctx: Arc<ClientContext>,
    executor: Arc<ActionExecutor>,
    cancel: CancellationToken,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Actions that rebuild a saved stack, bottom first.
fn restore_actions(page_keys: &[String]) -> Vec<ActionSpec> {
    let mut keys = page_keys
        .iter()
        .filter(|key| key.as_str() != LOADING_PAGE_KEY);
    let Some(first) = keys.next() else {
        return Vec::new();
    };
    let mut actions = vec![ActionSpec::replace_all(first.clone())];
    actions.extend(keys.map(|key| ActionSpec::push(key.clone())));
    actions
}

impl Session {
    pub fn new(ctx: Arc<ClientContext>) -> Self {
        Self {
            executor: Arc::new(ActionExecutor::new(ctx.clone())),
            ctx,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        lock(&self.tasks)
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.ctx
    }

    pub fn executor(&self) -> &Arc<ActionExecutor> {
        &self.executor
    }

    pub fn set_renderer(&self, renderer: Arc<dyn Renderer>) {
        self.ctx.state.set_renderer(renderer);
    }

    /// Load the first pages and start background polling. A saved snapshot
    /// brings back its vars and stack; if the stack cannot be rebuilt the
    /// home page is loaded instead. Returns whether the final load
    /// succeeded.
    ///
    /// Only the first call does anything; later calls return false.
    pub async fn start(&self, snapshot: Option<StateSnapshot>) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("session already started");
            return false;
        }
        let mut loaded = false;
        if let Some(snapshot) = snapshot {
            self.ctx
                .vars
                .restore(&snapshot.bool_vars, &snapshot.string_vars);
            let actions = restore_actions(&snapshot.page_keys);
            if !actions.is_empty() {
                loaded = self.executor.do_actions(LOADING_PAGE_KEY, actions).await;
                if !loaded {
                    tracing::warn!(
                        pages = snapshot.page_keys.len(),
                        "restoring saved pages failed, loading home page"
                    );
                }
            }
        }
        if !loaded {
            let home = ActionSpec::replace_all(self.ctx.home_page_key.clone());
            loaded = self.executor.do_actions(LOADING_PAGE_KEY, vec![home]).await;
        }

        let poller = BackgroundPoller::new(self.ctx.clone()).spawn(self.cancel.child_token());
        self.tasks().push(poller);
        loaded
    }

    /// Save the state to `store` every `interval`, and once more on shutdown.
    pub fn spawn_persistence(&self, store: Arc<dyn SnapshotStore>, interval: Duration) {
        let writer = spawn_writer(self.ctx.clone(), store, interval, self.cancel.child_token());
        self.tasks().push(writer);
    }

    pub async fn do_actions(&self, page_key: &str, actions: Vec<ActionSpec>) -> bool {
        self.executor.do_actions(page_key, actions).await
    }

    /// A debounced poller for one widget. Its tasks stop with the session.
    pub fn foreground_poller(&self) -> ForegroundPoller {
        ForegroundPoller::new(self.executor.clone(), self.cancel.clone())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.ctx.snapshot()
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel every task and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks: Vec<_> = self.tasks().drain(..).collect();
        for task in tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "session task ended abnormally");
            }
        }
        self.ctx.state.clear_renderer();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
