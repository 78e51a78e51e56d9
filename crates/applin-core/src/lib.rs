//! applin-core: page-stack state and protocol types for the Applin client.
//!
//! Everything here is synchronous and free of I/O:
//! - `clock`: logical (Lamport) and wall clocks, plus write tokens
//! - `page_stack`: the navigable stack of pages and its dirty flag
//! - `spec`: page specs, connection modes, and the response envelope
//! - `action`: the closed set of actions a page can trigger
//! - `var`: named bool/string values bound to widgets
//! - `static_pages`: client-built pages such as the error pages
//! - `snapshot`: the persisted-state view of vars and page keys
//!
//! The async runtime pieces (server calls, action execution, polling) live in
//! `applin-client`.

pub mod action;
pub mod clock;
pub mod error;
pub mod page_stack;
pub mod snapshot;
pub mod spec;
pub mod static_pages;
mod sync;
pub mod var;

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "applin-core"
}
