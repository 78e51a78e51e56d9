//! Debounced polls requested by widgets.
//!
//! A widget that wants its page refreshed after the user stops typing calls
//! `schedule` on every change. Only the last request survives: scheduling
//! cancels the previous task, whether it is still waiting or already
//! talking to the server.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use applin_core::action::ActionSpec;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::executor::ActionExecutor;
use crate::sync::lock;

pub struct ForegroundPoller {
    executor: Arc<ActionExecutor>,
    parent: CancellationToken,
    current: Mutex<Option<CancellationToken>>,
}

impl ForegroundPoller {
    /// Tasks are children of `parent`, so shutting down the session stops
    /// them too.
    pub fn new(executor: Arc<ActionExecutor>, parent: CancellationToken) -> Self {
        Self {
            executor,
            parent,
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        lock(&self.current)
    }

    /// Poll `page_key` after `delay`, replacing any earlier request. The
    /// task resolves to whether the poll ran to completion.
    pub fn schedule(&self, page_key: impl Into<String>, delay: Duration) -> JoinHandle<bool> {
        let page_key = page_key.into();
        let token = self.parent.child_token();
        if let Some(previous) = self.current().replace(token.clone()) {
            previous.cancel();
        }

        let executor = self.executor.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
            executor
                .do_actions_until(&page_key, vec![ActionSpec::Poll], &token)
                .await
        })
    }

    pub fn cancel(&self) {
        if let Some(token) = self.current().take() {
            token.cancel();
        }
    }
}

impl Drop for ForegroundPoller {
    fn drop(&mut self) {
        self.cancel();
    }
}
