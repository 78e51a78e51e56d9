//! Shared client context.
//!
//! One `ClientContext` owns the page stack, the vars, and the server caller;
//! the executor and pollers hold an `Arc` to it instead of reaching for
//! globals.

use std::sync::Arc;

use applin_core::clock::{Clock, SystemWallClock, Token, WallClock};
use applin_core::page_stack::PageStackState;
use applin_core::snapshot::StateSnapshot;
use applin_core::spec::{PageSpec, PageUpdate};
use applin_core::static_pages::{StaticPageInput, StaticPages, LOADING_PAGE_KEY};
use applin_core::var::{VarStore, VarValue};

use crate::error_state::ErrorState;
use crate::platform::Platform;
use crate::server_caller::ServerCaller;
use crate::state_guard::StateGuard;
use crate::transport::HttpTransport;

pub const DEFAULT_HOME_PAGE_KEY: &str = "/";

pub struct ClientContext {
    pub clock: Arc<Clock>,
    pub state: StateGuard,
    pub vars: VarStore,
    pub errors: Arc<ErrorState>,
    pub caller: ServerCaller,
    pub static_pages: StaticPages,
    pub platform: Arc<dyn Platform>,
    pub home_page_key: String,
}

pub struct ContextBuilder {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    platform: Arc<dyn Platform>,
    wall_clock: Arc<dyn WallClock>,
    static_pages: StaticPages,
    home_page_key: String,
}

impl ContextBuilder {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            platform,
            wall_clock: Arc::new(SystemWallClock),
            static_pages: StaticPages::with_defaults(),
            home_page_key: DEFAULT_HOME_PAGE_KEY.to_string(),
        }
    }

    pub fn wall_clock(mut self, wall_clock: Arc<dyn WallClock>) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    pub fn static_pages(mut self, static_pages: StaticPages) -> Self {
        self.static_pages = static_pages;
        self
    }

    pub fn home_page_key(mut self, key: impl Into<String>) -> Self {
        self.home_page_key = key.into();
        self
    }

    /// The stack starts on the loading page (a plain placeholder if the
    /// registry has none).
    pub fn build(self) -> Arc<ClientContext> {
        let clock = Arc::new(Clock::new(self.wall_clock));
        let errors = Arc::new(ErrorState::new());
        let loading = self
            .static_pages
            .build(LOADING_PAGE_KEY, &StaticPageInput::default())
            .unwrap_or_else(|| PageSpec::local(serde_json::json!({"typ": "plain_page"})));
        let stack = PageStackState::new(clock.clone(), LOADING_PAGE_KEY, loading);

        Arc::new(ClientContext {
            state: StateGuard::new(stack),
            vars: VarStore::new(),
            caller: ServerCaller::new(self.base_url, self.transport, errors.clone()),
            errors,
            clock,
            static_pages: self.static_pages,
            platform: self.platform,
            home_page_key: self.home_page_key,
        })
    }
}

impl ClientContext {
    pub fn is_static(&self, page_key: &str) -> bool {
        self.static_pages.contains(page_key)
    }

    /// Build a static page against the current client state.
    pub fn static_spec(&self, page_key: &str) -> Option<PageSpec> {
        let input = StaticPageInput {
            error_message: self.errors.message(),
        };
        self.static_pages.build(page_key, &input)
    }

    /// Values of the vars bound by the page currently stored under `page_key`.
    pub fn page_vars(&self, page_key: &str) -> Vec<(String, VarValue)> {
        let names = self
            .state
            .read_only(|s| s.spec(page_key).map(PageSpec::var_names))
            .unwrap_or_default();
        self.vars.values_for(&names)
    }

    /// Apply a server update to `page_key`. With a token the spec write is
    /// guarded and a dropped write also drops its vars. Returns whether the
    /// spec was written.
    pub fn apply_update(&self, page_key: &str, update: PageUpdate, token: Option<Token>) -> bool {
        let PageUpdate { spec, vars } = update;
        let Some(spec) = spec else {
            self.vars.apply(vars);
            return false;
        };
        let applied = self.state.mutate_and_notify(|s| match token {
            Some(token) => s.try_set(page_key, token, spec),
            None => s.set(page_key, spec),
        });
        if applied || token.is_none() {
            self.vars.apply(vars);
        }
        applied
    }

    pub fn page_keys(&self) -> Vec<String> {
        self.state.read_only(|s| s.page_keys())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state
            .read_only(|s| StateSnapshot::capture(&self.vars, s))
    }
}
