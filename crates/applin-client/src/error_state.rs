//! The most recent user-visible error, kept for the error-details page.

use std::sync::{Mutex, MutexGuard};

use applin_core::error::{ApplinError, ErrorKind};
use chrono::{DateTime, Utc};

use crate::sync::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedError {
    pub kind: ErrorKind,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ErrorState {
    last: Mutex<Option<RecordedError>>,
}

impl ErrorState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<RecordedError>> {
        lock(&self.last)
    }

    pub fn record(&self, err: &ApplinError) {
        *self.lock() = Some(RecordedError {
            kind: err.kind(),
            message: err.message().to_string(),
            recorded_at: Utc::now(),
        });
    }

    pub fn last(&self) -> Option<RecordedError> {
        self.lock().clone()
    }

    pub fn message(&self) -> Option<String> {
        self.lock().as_ref().map(|e| e.message.clone())
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn records_latest_error() {
        let state = ErrorState::new();
        assert!(state.last().is_none());

        state.record(&ApplinError::network("offline"));
        state.record(&ApplinError::user("bad input"));

        let last = state.last().unwrap();
        assert_eq!(last.kind, ErrorKind::User);
        assert_eq!(state.message().as_deref(), Some("bad input"));

        state.clear();
        assert!(state.message().is_none());
    }
}
