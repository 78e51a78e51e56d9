//! Server calls and response classification.
//!
//! Every response is classified into the `ApplinError` taxonomy by status
//! code before the body is looked at. A 2xx with an empty body means
//! "nothing to apply"; a non-empty 2xx must carry the page-envelope media
//! type.

use std::sync::Arc;

use applin_core::error::ApplinError;
use applin_core::spec::{PageUpdate, RESPONSE_CONTENT_TYPE};
use applin_core::var::VarValue;
use serde_json::{Map, Value};

use crate::error_state::ErrorState;
use crate::transport::{HttpRequest, HttpTransport, Method};

/// Longest error body kept as a user-facing message.
pub const MAX_ERROR_BODY_CHARS: usize = 1000;

/// Whether a failure should be recorded for the error-details page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Triggered by the user; errors are recorded.
    Interactive,
    /// Background refresh; errors are only returned.
    Background,
}

pub struct ServerCaller {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    errors: Arc<ErrorState>,
}

impl ServerCaller {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        errors: Arc<ErrorState>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            errors,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a page key or path. Absolute URLs pass through.
    pub fn url_for(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            return path_or_url.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path_or_url.trim_start_matches('/')
        )
    }

    /// Fetch a page: GET when there are no vars to send, POST otherwise.
    pub async fn fetch(
        &self,
        page_key: &str,
        vars: &[(String, VarValue)],
        mode: CallMode,
    ) -> Result<Option<PageUpdate>, ApplinError> {
        let method = if vars.is_empty() {
            Method::Get
        } else {
            Method::Post
        };
        self.call(method, page_key, vars, mode).await
    }

    pub async fn call(
        &self,
        method: Method,
        path_or_url: &str,
        vars: &[(String, VarValue)],
        mode: CallMode,
    ) -> Result<Option<PageUpdate>, ApplinError> {
        let result = self.call_inner(method, path_or_url, vars).await;
        if let Err(err) = &result {
            tracing::debug!(%method, path = path_or_url, error = %err, "server call failed");
            if mode == CallMode::Interactive {
                self.errors.record(err);
            }
        }
        result
    }

    async fn call_inner(
        &self,
        method: Method,
        path_or_url: &str,
        vars: &[(String, VarValue)],
    ) -> Result<Option<PageUpdate>, ApplinError> {
        let url = self.url_for(path_or_url);
        let mut request = HttpRequest::new(method, url).header("accept", RESPONSE_CONTENT_TYPE);
        if method != Method::Get {
            request = request
                .header("content-type", "application/json")
                .body(vars_body(vars)?);
        }

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ApplinError::network(e.to_string()))?;
        classify_status(response.status, &response.body)?;

        if response.body.is_empty() {
            return Ok(None);
        }
        check_content_type(response.content_type.as_deref())?;
        PageUpdate::decode(&response.body).map(Some)
    }

    /// PUT raw bytes, e.g. a photo. The response body is ignored.
    pub async fn upload(
        &self,
        path_or_url: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ApplinError> {
        let request = HttpRequest::new(Method::Put, self.url_for(path_or_url))
            .header("content-type", content_type)
            .body(bytes);
        let result = match self.transport.send(request).await {
            Ok(response) => classify_status(response.status, &response.body),
            Err(e) => Err(ApplinError::network(e.to_string())),
        };
        if let Err(err) = &result {
            tracing::debug!(path = path_or_url, error = %err, "upload failed");
            self.errors.record(err);
        }
        result
    }

    /// Drop cookies and other per-session transport state.
    pub fn reset_session(&self) {
        self.transport.reset_session();
    }
}

fn vars_body(vars: &[(String, VarValue)]) -> Result<Vec<u8>, ApplinError> {
    let mut obj = Map::new();
    for (name, value) in vars {
        let value = match value {
            VarValue::Bool(b) => Value::Bool(*b),
            VarValue::String(s) => Value::String(s.clone()),
        };
        obj.insert(name.clone(), value);
    }
    serde_json::to_vec(&Value::Object(obj))
        .map_err(|e| ApplinError::app(format!("error encoding request: {e}")))
}

fn body_message(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect()
}

/// Map an HTTP status to the error taxonomy. 2xx is success.
pub fn classify_status(status: u16, body: &[u8]) -> Result<(), ApplinError> {
    match status {
        200..=299 => Ok(()),
        403 | 422 => Err(ApplinError::user(body_message(body))),
        400..=499 => Err(ApplinError::app(format!(
            "server rejected request: {status} {}",
            body_message(body)
        ))),
        503 => Err(ApplinError::user(
            "The server is overloaded. Please try again.",
        )),
        500..=599 => Err(ApplinError::server(format!(
            "server error: {status} {}",
            body_message(body)
        ))),
        other => Err(ApplinError::server(format!(
            "unexpected response status {other}"
        ))),
    }
}

/// The media type (parameters stripped) must be the page envelope's.
pub fn check_content_type(content_type: Option<&str>) -> Result<(), ApplinError> {
    let media_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .unwrap_or_default();
    if media_type.eq_ignore_ascii_case(RESPONSE_CONTENT_TYPE) {
        Ok(())
    } else {
        Err(ApplinError::server(format!(
            "response content-type is {:?}, expected {RESPONSE_CONTENT_TYPE:?}",
            content_type.unwrap_or_default()
        )))
    }
}
