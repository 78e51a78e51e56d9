//! Test doubles for the transport, renderer, and platform.
//!
//! `MockTransport` answers by URL path from scripted replies and records every
//! request. `RecordingRenderer` records the page keys of every render.
//! `MockPlatform` records side effects and returns configured modal and photo
//! results.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use applin_core::spec::{PageSpec, RESPONSE_CONTENT_TYPE};

use crate::platform::{ModalSpec, Photo, PhotoRequest, Platform, PlatformError};
use crate::state_guard::Renderer;
use crate::sync::lock;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    Response {
        delay: Duration,
        response: HttpResponse,
    },
    Error {
        delay: Duration,
        error: TransportError,
    },
}

impl MockReply {
    pub fn response(response: HttpResponse) -> Self {
        Self::Response {
            delay: Duration::ZERO,
            response,
        }
    }

    /// 200 with a page envelope wrapping `page`.
    pub fn page(page: Value) -> Self {
        Self::envelope(json!({ "page": page }))
    }

    /// 200 with an arbitrary envelope body.
    pub fn envelope(envelope: Value) -> Self {
        Self::response(HttpResponse {
            status: 200,
            content_type: Some(RESPONSE_CONTENT_TYPE.to_string()),
            body: envelope.to_string().into_bytes(),
        })
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::response(HttpResponse {
            status,
            content_type: Some("text/plain".to_string()),
            body: body.as_bytes().to_vec(),
        })
    }

    pub fn empty() -> Self {
        Self::response(HttpResponse {
            status: 200,
            content_type: None,
            body: Vec::new(),
        })
    }

    pub fn error(error: TransportError) -> Self {
        Self::Error {
            delay: Duration::ZERO,
            error,
        }
    }

    /// Same reply after `delay` of (tokio) time.
    pub fn delayed(self, delay: Duration) -> Self {
        match self {
            Self::Response { response, .. } => Self::Response { delay, response },
            Self::Error { error, .. } => Self::Error { delay, error },
        }
    }
}

/// Path component of a URL, e.g. `http://h:1/a/b?x` -> `/a/b`.
pub fn url_path(url: &str) -> String {
    let rest = match url.find("://") {
        Some(i) => &url[i + 3..],
        None => url,
    };
    let path = match rest.find('/') {
        Some(i) => &rest[i..],
        None => "/",
    };
    path.split(['?', '#']).next().unwrap_or("/").to_string()
}

/// Scripted `HttpTransport`.
///
/// Replies for a path are consumed in order; the last one repeats. Paths with
/// no script answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<MockReply>>>,
    requests: Mutex<Vec<HttpRequest>>,
    resets: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `push_reply`.
    pub fn with_reply(self, path: &str, reply: MockReply) -> Self {
        self.push_reply(path, reply);
        self
    }

    pub fn with_page(self, path: &str, page: Value) -> Self {
        self.with_reply(path, MockReply::page(page))
    }

    pub fn push_reply(&self, path: &str, reply: MockReply) {
        lock(&self.routes)
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Drop pending replies for `path` and answer with `reply` from now on.
    pub fn set_reply(&self, path: &str, reply: MockReply) {
        let mut routes = lock(&self.routes);
        let queue = routes.entry(path.to_string()).or_default();
        queue.clear();
        queue.push_back(reply);
    }

    fn next_reply(&self, path: &str) -> Option<MockReply> {
        let mut routes = lock(&self.routes);
        let queue = routes.get_mut(path)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| url_path(&r.url) == path)
            .cloned()
            .collect()
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = url_path(&request.url);
        lock(&self.requests).push(request);

        match self.next_reply(&path) {
            Some(MockReply::Response { delay, response }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(response)
            }
            Some(MockReply::Error { delay, error }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Err(error)
            }
            None => Ok(HttpResponse {
                status: 404,
                content_type: Some("text/plain".to_string()),
                body: format!("no mock route for {path}").into_bytes(),
            }),
        }
    }

    fn reset_session(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Renderer that records the page keys of every render.
#[derive(Default)]
pub struct RecordingRenderer {
    renders: Mutex<Vec<Vec<(String, PageSpec)>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page keys of each render, oldest first.
    pub fn renders(&self) -> Vec<Vec<String>> {
        lock(&self.renders)
            .iter()
            .map(|pages| pages.iter().map(|(k, _)| k.clone()).collect())
            .collect()
    }

    pub fn render_count(&self) -> usize {
        lock(&self.renders).len()
    }

    /// Keys of the most recent render.
    pub fn last_keys(&self) -> Option<Vec<String>> {
        self.renders().pop()
    }

    /// Spec of `page_key` in the most recent render.
    pub fn last_spec(&self, page_key: &str) -> Option<PageSpec> {
        lock(&self.renders).last().and_then(|pages| {
            pages
                .iter()
                .find(|(k, _)| k == page_key)
                .map(|(_, spec)| spec.clone())
        })
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, pages: Vec<(String, PageSpec)>) {
        lock(&self.renders).push(pages);
    }
}

/// A side effect requested from `MockPlatform`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Working(bool),
    Clipboard(String),
    LaunchUrl(String),
    Modal(String),
    CapturePhoto(PhotoRequest),
}

/// Recording `Platform` with configurable modal and photo outcomes.
pub struct MockPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    working_at: Mutex<Vec<(bool, tokio::time::Instant)>>,
    modal_choice: Mutex<Option<usize>>,
    photo: Mutex<Result<Option<Photo>, PlatformError>>,
    launch_error: Mutex<Option<PlatformError>>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            working_at: Mutex::new(Vec::new()),
            modal_choice: Mutex::new(None),
            photo: Mutex::new(Ok(None)),
            launch_error: Mutex::new(None),
        }
    }

    /// Modals resolve with this button index.
    pub fn with_modal_choice(self, index: usize) -> Self {
        *lock(&self.modal_choice) = Some(index);
        self
    }

    pub fn with_photo(self, photo: Result<Option<Photo>, PlatformError>) -> Self {
        *lock(&self.photo) = photo;
        self
    }

    pub fn with_launch_error(self, err: PlatformError) -> Self {
        *lock(&self.launch_error) = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        lock(&self.calls).clone()
    }

    /// Working-indicator transitions with the (tokio) time they happened.
    pub fn working_transitions(&self) -> Vec<(bool, tokio::time::Instant)> {
        lock(&self.working_at).clone()
    }

    fn record(&self, call: PlatformCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn set_working(&self, working: bool) {
        lock(&self.working_at).push((working, tokio::time::Instant::now()));
        self.record(PlatformCall::Working(working));
    }

    fn copy_to_clipboard(&self, text: &str) {
        self.record(PlatformCall::Clipboard(text.to_string()));
    }

    fn launch_url(&self, url: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::LaunchUrl(url.to_string()));
        match lock(&self.launch_error).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn show_modal(&self, modal: &ModalSpec) -> Option<usize> {
        self.record(PlatformCall::Modal(modal.title.clone()));
        *lock(&self.modal_choice)
    }

    async fn capture_photo(&self, request: PhotoRequest) -> Result<Option<Photo>, PlatformError> {
        self.record(PlatformCall::CapturePhoto(request));
        lock(&self.photo).clone()
    }
}
