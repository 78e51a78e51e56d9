//! The single error currency of the client core.
//!
//! The taxonomy is flat: each variant names who is at fault, and the message
//! is what the user (or the error-details page) gets to see.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Client-core error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplinError {
    /// Client bug or misuse: malformed action, duplicate push, bad request.
    #[error("app error: {0}")]
    AppError(String),

    /// The server could not be reached.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The server failed or returned something the client cannot use.
    #[error("server error: {0}")]
    ServerError(String),

    /// The server rejected the request with a message for the user.
    #[error("user error: {0}")]
    UserError(String),
}

impl ApplinError {
    pub fn app(message: impl Into<String>) -> Self {
        Self::AppError(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError(message.into())
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::ServerError(message.into())
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::UserError(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AppError(_) => ErrorKind::App,
            Self::NetworkError(_) => ErrorKind::Network,
            Self::ServerError(_) => ErrorKind::Server,
            Self::UserError(_) => ErrorKind::User,
        }
    }

    /// The human-readable message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::AppError(m) | Self::NetworkError(m) | Self::ServerError(m) | Self::UserError(m) => m,
        }
    }
}

/// Variant tag of `ApplinError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    App,
    Network,
    Server,
    User,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Network => "network",
            Self::Server => "server",
            Self::User => "user",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
