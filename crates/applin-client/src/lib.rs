//! applin-client: the async half of the Applin client.
//!
//! `Session` ties it together. It owns a `ClientContext` (page stack, vars,
//! server caller, platform hooks), an `ActionExecutor` that runs action
//! lists one at a time, and the background tasks: the page poller and the
//! optional state writer. Widgets that refresh while the user types get a
//! `ForegroundPoller`.
//!
//! The UI plugs in through two traits: `state_guard::Renderer` receives the
//! page stack after every change, and `platform::Platform` provides modals,
//! photos, the clipboard, and the working indicator.

pub mod cli;
pub mod config;
pub mod context;
pub mod error_state;
pub mod executor;
pub mod foreground;
pub mod logging;
pub mod mock;
pub mod persistence;
pub mod platform;
pub mod poller;
pub mod server_caller;
pub mod session;
pub mod state_guard;
mod sync;
pub mod transport;
pub mod working;

pub use cli::{run_from_env, run_with_args};
pub use session::Session;

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "applin-client"
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "applin-client");
    }
}
