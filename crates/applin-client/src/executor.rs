//! Runs action lists.
//!
//! One list runs at a time: `do_actions_until` holds the executor lock for
//! the whole list, so a foreground poll never interleaves with a user tap.
//! Every await inside a list is raced against the list's cancel token, so a
//! cancelled list lets go of the lock without waiting for the server.
//! The first error aborts the list, gets recorded, and its static error page
//! is pushed (or refreshed when it is already showing).

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use applin_core::action::ActionSpec;
use applin_core::error::ApplinError;
use applin_core::spec::PageSpec;
use applin_core::static_pages::error_page_key;
use tokio_util::sync::CancellationToken;

use crate::context::ClientContext;
use crate::platform::{ModalSpec, PhotoRequest, PhotoSource};
use crate::server_caller::CallMode;
use crate::transport::Method;
use crate::working::WorkingIndicator;

/// What the list does after an action.
enum Flow {
    Continue,
    /// `stop_actions`: end the list as a success.
    Stop,
    /// The user backed out (dismissed modal, cancelled photo).
    Halt,
    /// Run these next, ahead of the rest.
    Insert(Vec<ActionSpec>),
}

/// Why an action did not finish.
enum Abort {
    Failed(ApplinError),
    Cancelled,
}

impl From<ApplinError> for Abort {
    fn from(err: ApplinError) -> Self {
        Abort::Failed(err)
    }
}

async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    work: F,
) -> Result<F::Output, Abort> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Abort::Cancelled),
        out = work => Ok(out),
    }
}

pub struct ActionExecutor {
    ctx: Arc<ClientContext>,
    running: tokio::sync::Mutex<()>,
}

impl ActionExecutor {
    pub fn new(ctx: Arc<ClientContext>) -> Self {
        Self {
            ctx,
            running: tokio::sync::Mutex::new(()),
        }
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.ctx
    }

    /// Run `actions` for the page `page_key`. Returns true when the list ran
    /// to the end or stopped at `stop_actions`.
    pub async fn do_actions(&self, page_key: &str, actions: Vec<ActionSpec>) -> bool {
        self.do_actions_until(page_key, actions, &CancellationToken::new())
            .await
    }

    /// Like `do_actions`, but gives up quietly once `cancel` fires, including
    /// in the middle of a server call.
    pub async fn do_actions_until(
        &self,
        page_key: &str,
        actions: Vec<ActionSpec>,
        cancel: &CancellationToken,
    ) -> bool {
        let _running = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            guard = self.running.lock() => guard,
        };

        let mut queue: VecDeque<ActionSpec> = actions.into();
        while let Some(action) = queue.pop_front() {
            if cancel.is_cancelled() {
                return false;
            }
            tracing::debug!(page_key, action = action.name(), "running action");

            let result = if self.shows_working(page_key, &action) {
                let indicator = WorkingIndicator::start(self.ctx.platform.clone());
                let result = self.run_action(page_key, &action, cancel).await;
                indicator.finish_until(cancel).await;
                result
            } else {
                self.run_action(page_key, &action, cancel).await
            };

            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => return true,
                Ok(Flow::Halt) => {
                    tracing::debug!(page_key, action = action.name(), "action list halted by user");
                    return false;
                }
                Ok(Flow::Insert(next)) => {
                    for inserted in next.into_iter().rev() {
                        queue.push_front(inserted);
                    }
                }
                Err(Abort::Cancelled) => {
                    tracing::debug!(page_key, action = action.name(), "action list cancelled");
                    return false;
                }
                Err(Abort::Failed(err)) => {
                    tracing::warn!(page_key, action = action.name(), error = %err, "action list aborted");
                    self.surface_error(&err);
                    return false;
                }
            }
        }
        true
    }

    /// Whether `action` will call the server. Static pages are built locally,
    /// and photo actions show the indicator only around the upload.
    fn shows_working(&self, page_key: &str, action: &ActionSpec) -> bool {
        match action {
            ActionSpec::Poll => !self.ctx.is_static(page_key),
            ActionSpec::Push { page } => {
                !self.ctx.is_static(page) && !self.ctx.state.read_only(|s| s.contains(page))
            }
            ActionSpec::ReplaceAll { page } => !self.ctx.is_static(page),
            ActionSpec::Logout => !self.ctx.is_static(&self.ctx.home_page_key),
            ActionSpec::ChoosePhoto { .. } | ActionSpec::TakePhoto { .. } => false,
            other => other.is_network_triggering(),
        }
    }

    async fn run_action(
        &self,
        page_key: &str,
        action: &ActionSpec,
        cancel: &CancellationToken,
    ) -> Result<Flow, Abort> {
        match action {
            ActionSpec::Poll => self.poll(page_key, cancel).await,
            ActionSpec::Pop => {
                self.ctx.state.mutate_and_notify(|s| s.pop())?;
                Ok(Flow::Continue)
            }
            ActionSpec::Push { page } => self.push(page, cancel).await,
            ActionSpec::ReplaceAll { page } => self.replace_all(page, cancel).await,
            ActionSpec::Rpc {
                url,
                on_user_error_poll,
            } => self.rpc(page_key, url, *on_user_error_poll, cancel).await,
            ActionSpec::ChoosePhoto { url, aspect_ratio } => {
                self.photo(PhotoSource::Library, url, *aspect_ratio, cancel)
                    .await
            }
            ActionSpec::TakePhoto { url, aspect_ratio } => {
                self.photo(PhotoSource::Camera, url, *aspect_ratio, cancel)
                    .await
            }
            ActionSpec::CopyToClipboard { string } => {
                self.ctx.platform.copy_to_clipboard(string);
                Ok(Flow::Continue)
            }
            ActionSpec::LaunchUrl { url } => {
                if let Err(e) = self.ctx.platform.launch_url(url) {
                    tracing::warn!(url = %url, error = %e, "launch url failed");
                }
                Ok(Flow::Continue)
            }
            ActionSpec::Logout => {
                self.ctx.vars.clear();
                self.ctx.errors.clear();
                self.ctx.caller.reset_session();
                let home = self.ctx.home_page_key.clone();
                self.replace_all(&home, cancel).await
            }
            ActionSpec::Modal {
                title,
                message,
                buttons,
            } => {
                let modal = ModalSpec {
                    title: title.clone(),
                    message: message.clone(),
                    buttons: buttons.clone(),
                };
                let choice = until_cancelled(cancel, self.ctx.platform.show_modal(&modal)).await?;
                match choice.and_then(|i| buttons.get(i)) {
                    Some(button) => Ok(Flow::Insert(button.actions.clone())),
                    None => Ok(Flow::Halt),
                }
            }
            ActionSpec::StopActions => Ok(Flow::Stop),
        }
    }

    async fn poll(&self, page_key: &str, cancel: &CancellationToken) -> Result<Flow, Abort> {
        if let Some(spec) = self.ctx.static_spec(page_key) {
            self.ctx.state.mutate_and_notify(|s| s.set(page_key, spec));
            return Ok(Flow::Continue);
        }
        let vars = self.ctx.page_vars(page_key);
        let fetch = self.ctx.caller.fetch(page_key, &vars, CallMode::Interactive);
        if let Some(update) = until_cancelled(cancel, fetch).await?? {
            self.ctx.apply_update(page_key, update, None);
        }
        Ok(Flow::Continue)
    }

    async fn push(&self, page_key: &str, cancel: &CancellationToken) -> Result<Flow, Abort> {
        if self.ctx.state.read_only(|s| s.contains(page_key)) {
            return Err(ApplinError::app(format!("page {page_key} is already on the stack")).into());
        }
        let spec = self.page_spec(page_key, cancel).await?;
        self.ctx.state.mutate_and_notify(|s| s.push(page_key, spec))?;
        Ok(Flow::Continue)
    }

    async fn replace_all(&self, page_key: &str, cancel: &CancellationToken) -> Result<Flow, Abort> {
        let spec = self.page_spec(page_key, cancel).await?;
        self.ctx
            .state
            .mutate_and_notify(|s| s.replace_all(page_key, spec));
        Ok(Flow::Continue)
    }

    /// Static pages are built locally; others are fetched with GET and must
    /// return a page.
    async fn page_spec(&self, page_key: &str, cancel: &CancellationToken) -> Result<PageSpec, Abort> {
        if let Some(spec) = self.ctx.static_spec(page_key) {
            return Ok(spec);
        }
        let fetch = self.ctx.caller.fetch(page_key, &[], CallMode::Interactive);
        let update = until_cancelled(cancel, fetch)
            .await??
            .ok_or_else(|| self.empty_response(page_key))?;
        let spec = update.spec.ok_or_else(|| self.empty_response(page_key))?;
        self.ctx.vars.apply(update.vars);
        Ok(spec)
    }

    fn empty_response(&self, page_key: &str) -> ApplinError {
        let err = ApplinError::server(format!("server returned no page for {page_key}"));
        self.ctx.errors.record(&err);
        err
    }

    async fn rpc(
        &self,
        page_key: &str,
        url: &str,
        on_user_error_poll: bool,
        cancel: &CancellationToken,
    ) -> Result<Flow, Abort> {
        let vars = self.ctx.page_vars(page_key);
        let call = self
            .ctx
            .caller
            .call(Method::Post, url, &vars, CallMode::Interactive);
        match until_cancelled(cancel, call).await? {
            Ok(Some(update)) => {
                self.ctx.apply_update(page_key, update, None);
                Ok(Flow::Continue)
            }
            Ok(None) => Ok(Flow::Continue),
            Err(err @ ApplinError::UserError(_)) if on_user_error_poll => {
                self.poll(page_key, cancel).await?;
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn photo(
        &self,
        source: PhotoSource,
        url: &str,
        aspect_ratio: Option<f32>,
        cancel: &CancellationToken,
    ) -> Result<Flow, Abort> {
        let capture = self.ctx.platform.capture_photo(PhotoRequest {
            source,
            aspect_ratio,
        });
        let photo = match until_cancelled(cancel, capture).await? {
            Ok(Some(photo)) => photo,
            Ok(None) => return Ok(Flow::Halt),
            Err(e) => {
                let err = ApplinError::app(format!("photo capture failed: {e}"));
                self.ctx.errors.record(&err);
                return Err(err.into());
            }
        };

        let indicator = WorkingIndicator::start(self.ctx.platform.clone());
        let upload = self
            .ctx
            .caller
            .upload(url, &photo.content_type, photo.bytes);
        let result = until_cancelled(cancel, upload).await;
        indicator.finish_until(cancel).await;
        result??;
        Ok(Flow::Continue)
    }

    /// Record `err` and show its error page on top. An error page already in
    /// the stack is refreshed and the pages above it are popped.
    fn surface_error(&self, err: &ApplinError) {
        self.ctx.errors.record(err);
        let page_key = error_page_key(err.kind());
        let Some(spec) = self.ctx.static_spec(page_key) else {
            tracing::warn!(page_key, "no static page registered for error");
            return;
        };
        self.ctx.state.mutate_and_notify(|s| {
            if s.pop_to(page_key) {
                s.set(page_key, spec);
            } else if let Err(e) = s.push(page_key, spec) {
                tracing::warn!(page_key, error = %e, "could not show error page");
            }
        });
    }
}
