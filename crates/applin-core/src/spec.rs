//! Page specs and the server response envelope.
//!
//! A page spec is an opaque widget tree owned by the rendering layer. The core
//! only reads the few top-level fields that decide how the page stays fresh
//! (`stream`, `poll_seconds`) and the `var_name` bindings that decide which
//! vars go into a request for the page.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ApplinError;
use crate::var::VarValue;

/// Media type of a page-envelope response body.
pub const RESPONSE_CONTENT_TYPE: &str = "application/vnd.applin_response";

/// How a page keeps itself up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionMode {
    /// Server pushes updates over a persistent stream.
    Stream,
    /// Re-fetch once the page is this many seconds old. Always > 0.
    PollSeconds(u32),
    /// Fetched once; never refreshed in the background.
    Disconnect,
}

impl ConnectionMode {
    /// `stream` wins over polling; a zero or absent interval means disconnect.
    pub fn new(stream: bool, poll_seconds: Option<u32>) -> Self {
        if stream {
            return Self::Stream;
        }
        match poll_seconds {
            Some(n) if n > 0 => Self::PollSeconds(n),
            _ => Self::Disconnect,
        }
    }

    pub fn poll_seconds(self) -> Option<u32> {
        match self {
            Self::PollSeconds(n) => Some(n),
            Self::Stream | Self::Disconnect => None,
        }
    }
}

/// A server- or client-built page description.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSpec {
    title: Option<String>,
    tree: Value,
    connection_mode: ConnectionMode,
}

impl PageSpec {
    /// Build a spec from page JSON. The value must be an object.
    pub fn from_json(tree: Value) -> Result<Self, ApplinError> {
        let Some(obj) = tree.as_object() else {
            return Err(ApplinError::server("page is not a JSON object"));
        };

        let title = obj.get("title").and_then(Value::as_str).map(str::to_string);
        let stream = obj.get("stream").and_then(Value::as_bool).unwrap_or(false);
        let poll_seconds = match obj.get("poll_seconds") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let n = v.as_u64().ok_or_else(|| {
                    ApplinError::server(format!("page poll_seconds is not a whole number: {v}"))
                })?;
                Some(u32::try_from(n).unwrap_or(u32::MAX))
            }
        };

        Ok(Self {
            title,
            connection_mode: ConnectionMode::new(stream, poll_seconds),
            tree,
        })
    }

    /// Spec for a client-built page. Never refreshed in the background.
    pub fn local(tree: Value) -> Self {
        let title = tree.get("title").and_then(Value::as_str).map(str::to_string);
        Self {
            title,
            tree,
            connection_mode: ConnectionMode::Disconnect,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn connection_mode(&self) -> ConnectionMode {
        self.connection_mode
    }

    /// Names of every var bound by a widget in this page, in tree order.
    pub fn var_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_var_names(&self.tree, &mut names);
        names
    }
}

fn collect_var_names(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("var_name") {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            for child in map.values() {
                collect_var_names(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_var_names(item, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

/// A decoded response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct PageUpdate {
    pub spec: Option<PageSpec>,
    pub vars: Vec<(String, VarValue)>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    page: Option<Value>,
    #[serde(default)]
    vars: Option<Map<String, Value>>,
}

impl PageUpdate {
    pub fn new(spec: PageSpec) -> Self {
        Self {
            spec: Some(spec),
            vars: Vec::new(),
        }
    }

    /// Decode an `application/vnd.applin_response` body.
    pub fn decode(body: &[u8]) -> Result<Self, ApplinError> {
        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| ApplinError::server(format!("error decoding response: {e}")))?;

        let spec = match envelope.page {
            None | Some(Value::Null) => None,
            Some(page) => Some(PageSpec::from_json(page)?),
        };

        let mut vars = Vec::new();
        for (name, value) in envelope.vars.unwrap_or_default() {
            let value = match value {
                Value::Bool(b) => VarValue::Bool(b),
                Value::String(s) => VarValue::String(s),
                other => {
                    return Err(ApplinError::server(format!(
                        "var {name:?} has unsupported value {other}"
                    )))
                }
            };
            vars.push((name, value));
        }

        Ok(Self { spec, vars })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn connection_mode_prefers_stream() {
        assert_eq!(ConnectionMode::new(true, Some(5)), ConnectionMode::Stream);
        assert_eq!(
            ConnectionMode::new(false, Some(5)),
            ConnectionMode::PollSeconds(5)
        );
        assert_eq!(ConnectionMode::new(false, Some(0)), ConnectionMode::Disconnect);
        assert_eq!(ConnectionMode::new(false, None), ConnectionMode::Disconnect);
    }

    #[test]
    fn page_spec_reads_title_and_poll_interval() {
        let spec = PageSpec::from_json(json!({
            "typ": "nav_page",
            "title": "Inbox",
            "poll_seconds": 30,
        }))
        .unwrap();
        assert_eq!(spec.title(), Some("Inbox"));
        assert_eq!(spec.connection_mode(), ConnectionMode::PollSeconds(30));
    }

    #[test]
    fn page_spec_rejects_non_object() {
        let err = PageSpec::from_json(json!(["not", "a", "page"])).unwrap_err();
        assert!(matches!(err, ApplinError::ServerError(_)));
    }

    #[test]
    fn page_spec_rejects_fractional_poll_seconds() {
        let err = PageSpec::from_json(json!({"poll_seconds": 1.5})).unwrap_err();
        assert!(matches!(err, ApplinError::ServerError(_)));
    }

    #[test]
    fn var_names_are_collected_in_tree_order_without_duplicates() {
        let spec = PageSpec::from_json(json!({
            "typ": "nav_page",
            "widget": {
                "typ": "column",
                "widgets": [
                    {"typ": "textfield", "var_name": "name"},
                    {"typ": "checkbox", "var_name": "agree"},
                    {"typ": "form", "widgets": [{"typ": "textfield", "var_name": "name"}]},
                ],
            },
        }))
        .unwrap();
        assert_eq!(spec.var_names(), vec!["name".to_string(), "agree".to_string()]);
    }

    #[test]
    fn decode_envelope_with_page_and_vars() {
        let body = br#"{"page":{"typ":"plain_page","title":"A"},"vars":{"agree":true,"name":"x"}}"#;
        let update = PageUpdate::decode(body).unwrap();
        assert_eq!(update.spec.unwrap().title(), Some("A"));
        assert_eq!(update.vars.len(), 2);
        assert!(update
            .vars
            .contains(&("agree".to_string(), VarValue::Bool(true))));
    }

    #[test]
    fn decode_envelope_without_page() {
        let update = PageUpdate::decode(br#"{"vars":{}}"#).unwrap();
        assert!(update.spec.is_none());
        assert!(update.vars.is_empty());
    }

    #[test]
    fn decode_rejects_numeric_var() {
        let err = PageUpdate::decode(br#"{"vars":{"n":3}}"#).unwrap_err();
        assert!(matches!(err, ApplinError::ServerError(_)));
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let err = PageUpdate::decode(b"{not json").unwrap_err();
        assert!(matches!(err, ApplinError::ServerError(_)));
    }
}
