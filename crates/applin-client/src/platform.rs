//! Host platform services used by actions.
//!
//! The UI layer implements `Platform`; the core only calls it. `HeadlessPlatform`
//! is a log-only implementation for the CLI.

use async_trait::async_trait;

use applin_core::action::ModalButton;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("not supported on this platform: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Failed(String),
}

/// Where a photo comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSource {
    Library,
    Camera,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRequest {
    pub source: PhotoSource,
    pub aspect_ratio: Option<f32>,
}

/// Captured photo bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A modal dialog to show.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalSpec {
    pub title: String,
    pub message: Option<String>,
    pub buttons: Vec<ModalButton>,
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Show or hide the "working" indicator.
    fn set_working(&self, working: bool);

    fn copy_to_clipboard(&self, text: &str);

    fn launch_url(&self, url: &str) -> Result<(), PlatformError>;

    /// Show a modal and wait for the user. Returns the index of the pressed
    /// button, or `None` when dismissed.
    async fn show_modal(&self, modal: &ModalSpec) -> Option<usize>;

    /// Let the user pick or take a photo. `Ok(None)` means the user cancelled.
    async fn capture_photo(&self, request: PhotoRequest) -> Result<Option<Photo>, PlatformError>;
}

/// Platform without a screen: logs requests, dismisses modals, and has no
/// camera.
#[derive(Debug, Default)]
pub struct HeadlessPlatform;

#[async_trait]
impl Platform for HeadlessPlatform {
    fn set_working(&self, working: bool) {
        tracing::debug!(working, "working indicator");
    }

    fn copy_to_clipboard(&self, text: &str) {
        tracing::info!(text, "copy to clipboard");
    }

    fn launch_url(&self, url: &str) -> Result<(), PlatformError> {
        tracing::info!(url, "launch url");
        Ok(())
    }

    async fn show_modal(&self, modal: &ModalSpec) -> Option<usize> {
        tracing::info!(title = %modal.title, "modal dismissed (headless)");
        None
    }

    async fn capture_photo(&self, _request: PhotoRequest) -> Result<Option<Photo>, PlatformError> {
        Err(PlatformError::Unsupported("photo capture".into()))
    }
}
