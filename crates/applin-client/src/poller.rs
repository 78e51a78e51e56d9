//! Background refresh of polling pages.
//!
//! Every page on the stack whose connection mode is `PollSeconds(n)` is
//! refetched once it is `n` seconds old. Results are written with a token
//! minted before the request, so a user action that lands while the request
//! is in flight wins over the older response.

use std::sync::Arc;
use std::time::Duration;

use applin_core::error::ApplinError;
use applin_core::spec::ConnectionMode;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::ClientContext;
use crate::server_caller::CallMode;

/// Sleep before each iteration, indexed by consecutive failures.
pub const BACKOFF_MS: [u64; 4] = [1000, 5000, 10000, 30000];

/// Delay before the next iteration after `failures` failed iterations in a
/// row. Caps at the last step.
pub fn backoff_delay(failures: u32) -> Duration {
    let index = (failures as usize).min(BACKOFF_MS.len() - 1);
    Duration::from_millis(BACKOFF_MS[index])
}

pub struct BackgroundPoller {
    ctx: Arc<ClientContext>,
}

impl BackgroundPoller {
    pub fn new(ctx: Arc<ClientContext>) -> Self {
        Self { ctx }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut failures: u32 = 0;
        loop {
            let delay = backoff_delay(failures);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            match self.poll_once(&cancel).await {
                Ok(_) => failures = 0,
                Err(err) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(
                        failures,
                        delay_ms = backoff_delay(failures).as_millis() as u64,
                        error = %err,
                        "background poll failed"
                    );
                }
            }
        }
        tracing::debug!("background poller stopped");
    }

    /// One pass over the stack, top to bottom. Returns how many pages were
    /// fetched. The first error ends the pass; cancelling abandons the
    /// request in flight.
    pub async fn poll_once(&self, cancel: &CancellationToken) -> Result<usize, ApplinError> {
        let entries = self.ctx.state.read_only(|s| s.entries());
        let now = self.ctx.clock.now_wall_secs();
        let mut fetched = 0;

        for (page_key, spec, updated_wall_secs) in entries.into_iter().rev() {
            if cancel.is_cancelled() {
                break;
            }
            let ConnectionMode::PollSeconds(seconds) = spec.connection_mode() else {
                continue;
            };
            if self.ctx.is_static(&page_key) {
                continue;
            }
            if updated_wall_secs + u64::from(seconds) > now {
                continue;
            }

            let token = self.ctx.clock.token();
            let vars = self.ctx.page_vars(&page_key);
            let fetch = self.ctx.caller.fetch(&page_key, &vars, CallMode::Background);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = fetch => result,
            };
            fetched += 1;
            if let Some(update) = result? {
                if !self.ctx.apply_update(&page_key, update, Some(token)) {
                    tracing::debug!(page_key = %page_key, "background update not applied");
                }
            }
        }
        Ok(fetched)
    }
}
