//! Actions a page can trigger.
//!
//! Actions arrive inside page trees as JSON objects tagged by `typ`, e.g.
//! `{"typ": "push", "page": "/settings"}`.

use serde::{Deserialize, Serialize};

/// One step of an action list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typ", rename_all = "snake_case")]
pub enum ActionSpec {
    ChoosePhoto {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        aspect_ratio: Option<f32>,
    },
    CopyToClipboard {
        string: String,
    },
    LaunchUrl {
        url: String,
    },
    Logout,
    Modal {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default)]
        buttons: Vec<ModalButton>,
    },
    Poll,
    Pop,
    Push {
        page: String,
    },
    ReplaceAll {
        page: String,
    },
    Rpc {
        url: String,
        #[serde(default)]
        on_user_error_poll: bool,
    },
    StopActions,
    TakePhoto {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        aspect_ratio: Option<f32>,
    },
}

/// A button of a modal dialog and the actions it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalButton {
    pub text: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_destructive: bool,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

impl ActionSpec {
    pub fn push(page_key: impl Into<String>) -> Self {
        Self::Push {
            page: page_key.into(),
        }
    }

    pub fn replace_all(page_key: impl Into<String>) -> Self {
        Self::ReplaceAll {
            page: page_key.into(),
        }
    }

    pub fn rpc(url: impl Into<String>) -> Self {
        Self::Rpc {
            url: url.into(),
            on_user_error_poll: false,
        }
    }

    /// Stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChoosePhoto { .. } => "choose_photo",
            Self::CopyToClipboard { .. } => "copy_to_clipboard",
            Self::LaunchUrl { .. } => "launch_url",
            Self::Logout => "logout",
            Self::Modal { .. } => "modal",
            Self::Poll => "poll",
            Self::Pop => "pop",
            Self::Push { .. } => "push",
            Self::ReplaceAll { .. } => "replace_all",
            Self::Rpc { .. } => "rpc",
            Self::StopActions => "stop_actions",
            Self::TakePhoto { .. } => "take_photo",
        }
    }

    /// Whether running the action may talk to the server.
    pub fn is_network_triggering(&self) -> bool {
        match self {
            Self::ChoosePhoto { .. }
            | Self::Logout
            | Self::Poll
            | Self::Push { .. }
            | Self::ReplaceAll { .. }
            | Self::Rpc { .. }
            | Self::TakePhoto { .. } => true,
            Self::CopyToClipboard { .. }
            | Self::LaunchUrl { .. }
            | Self::Modal { .. }
            | Self::Pop
            | Self::StopActions => false,
        }
    }
}

/// Parse a JSON array of actions.
pub fn parse_actions(value: &serde_json::Value) -> Result<Vec<ActionSpec>, serde_json::Error> {
    Vec::<ActionSpec>::deserialize(value)
}
