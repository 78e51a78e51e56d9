//! Pages built entirely on the client.
//!
//! Static pages are never fetched: pushing one builds its spec locally, and
//! polling one rebuilds it (so the error-details page always shows the latest
//! recorded error). The background poller skips them.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Value};

use crate::error::ErrorKind;
use crate::spec::PageSpec;

pub const LOADING_PAGE_KEY: &str = "/applin-loading";
pub const CLIENT_ERROR_PAGE_KEY: &str = "/applin-client-error";
pub const NETWORK_ERROR_PAGE_KEY: &str = "/applin-network-error";
pub const SERVER_ERROR_PAGE_KEY: &str = "/applin-server-error";
pub const USER_ERROR_PAGE_KEY: &str = "/applin-user-error";
pub const ERROR_DETAILS_PAGE_KEY: &str = "/applin-error-details";

/// Static page key shown for an error of the given kind.
pub fn error_page_key(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::App => CLIENT_ERROR_PAGE_KEY,
        ErrorKind::Network => NETWORK_ERROR_PAGE_KEY,
        ErrorKind::Server => SERVER_ERROR_PAGE_KEY,
        ErrorKind::User => USER_ERROR_PAGE_KEY,
    }
}

/// Client state a static page may display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticPageInput {
    pub error_message: Option<String>,
}

pub type StaticPageBuilder = Box<dyn Fn(&StaticPageInput) -> PageSpec + Send + Sync>;

/// Registry of static pages by key.
pub struct StaticPages {
    builders: BTreeMap<String, StaticPageBuilder>,
}

impl Default for StaticPages {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for StaticPages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticPages")
            .field("keys", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StaticPages {
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// Registry with the loading page, the four error pages, and the
    /// error-details page.
    pub fn with_defaults() -> Self {
        let mut pages = Self::empty();
        pages.register(LOADING_PAGE_KEY, |_| loading_page());
        pages.register(CLIENT_ERROR_PAGE_KEY, |_| {
            error_page(
                "Error",
                "The app has a problem. Please try again later or contact support.",
            )
        });
        pages.register(NETWORK_ERROR_PAGE_KEY, |_| {
            error_page(
                "Connection Problem",
                "Could not reach the server. Check your connection and try again.",
            )
        });
        pages.register(SERVER_ERROR_PAGE_KEY, |_| {
            error_page(
                "Server Error",
                "The server had a problem. Please try again later.",
            )
        });
        pages.register(USER_ERROR_PAGE_KEY, user_error_page);
        pages.register(ERROR_DETAILS_PAGE_KEY, error_details_page);
        pages
    }

    pub fn register<F>(&mut self, page_key: &str, builder: F)
    where
        F: Fn(&StaticPageInput) -> PageSpec + Send + Sync + 'static,
    {
        self.builders.insert(page_key.to_string(), Box::new(builder));
    }

    pub fn contains(&self, page_key: &str) -> bool {
        self.builders.contains_key(page_key)
    }

    pub fn build(&self, page_key: &str, input: &StaticPageInput) -> Option<PageSpec> {
        self.builders.get(page_key).map(|builder| builder(input))
    }

    pub fn keys(&self) -> Vec<String> {
        self.builders.keys().cloned().collect()
    }
}

fn text(s: &str) -> Value {
    json!({"typ": "text", "text": s})
}

fn button(label: &str, actions: Value) -> Value {
    json!({"typ": "button", "text": label, "actions": actions})
}

fn loading_page() -> PageSpec {
    PageSpec::local(json!({
        "typ": "plain_page",
        "title": "Loading",
        "widget": {"typ": "column", "widgets": [text("Loading...")]},
    }))
}

fn error_page(title: &str, message: &str) -> PageSpec {
    PageSpec::local(json!({
        "typ": "nav_page",
        "title": title,
        "widget": {
            "typ": "column",
            "widgets": [
                text(message),
                button("Details", json!([{"typ": "push", "page": ERROR_DETAILS_PAGE_KEY}])),
                button("Back", json!([{"typ": "pop"}])),
            ],
        },
    }))
}

fn user_error_page(input: &StaticPageInput) -> PageSpec {
    let message = input
        .error_message
        .as_deref()
        .unwrap_or("The server rejected the request.");
    PageSpec::local(json!({
        "typ": "nav_page",
        "title": "Problem",
        "widget": {
            "typ": "column",
            "widgets": [text(message), button("OK", json!([{"typ": "pop"}]))],
        },
    }))
}

fn error_details_page(input: &StaticPageInput) -> PageSpec {
    let message = input.error_message.as_deref().unwrap_or("No error details.");
    PageSpec::local(json!({
        "typ": "nav_page",
        "title": "Error Details",
        "widget": {
            "typ": "column",
            "widgets": [
                text(message),
                button("Copy", json!([{"typ": "copy_to_clipboard", "string": message}])),
            ],
        },
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::spec::ConnectionMode;

    #[test]
    fn every_error_kind_has_a_registered_page() {
        let pages = StaticPages::with_defaults();
        for kind in [
            ErrorKind::App,
            ErrorKind::Network,
            ErrorKind::Server,
            ErrorKind::User,
        ] {
            assert!(pages.contains(error_page_key(kind)), "{kind}");
        }
    }

    #[test]
    fn details_page_shows_recorded_message() {
        let pages = StaticPages::with_defaults();
        let spec = pages
            .build(
                ERROR_DETAILS_PAGE_KEY,
                &StaticPageInput {
                    error_message: Some("boom".into()),
                },
            )
            .unwrap();
        assert_eq!(spec.tree()["widget"]["widgets"][0]["text"], "boom");
        assert_eq!(spec.connection_mode(), ConnectionMode::Disconnect);
    }

    #[test]
    fn custom_page_can_be_registered() {
        let mut pages = StaticPages::empty();
        assert!(!pages.contains("/about"));
        pages.register("/about", |_| PageSpec::local(json!({"title": "About"})));
        let spec = pages.build("/about", &StaticPageInput::default()).unwrap();
        assert_eq!(spec.title(), Some("About"));
    }

    #[test]
    fn unknown_key_builds_nothing() {
        let pages = StaticPages::with_defaults();
        assert!(pages.build("/", &StaticPageInput::default()).is_none());
    }
}
