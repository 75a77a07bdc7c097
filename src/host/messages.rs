use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::session::CurrentSession;

/// Events the browser extension forwards to the daemon. The `type` tag and
/// field names are the wire contract with the extension side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BrowserEvent {
    /// The user switched to a different tab.
    #[serde(rename_all = "camelCase")]
    TabActivated {
        url: String,
        #[serde(default)]
        window_focused: bool,
    },
    /// The URL changed inside a tab; only the active tab matters.
    #[serde(rename_all = "camelCase")]
    TabUpdated {
        url: String,
        #[serde(default)]
        active: bool,
        #[serde(default)]
        window_focused: bool,
    },
    /// Browser window focus moved; `url` is the active tab of the newly
    /// focused window, absent when focus left the browser entirely.
    #[serde(rename_all = "camelCase")]
    WindowFocusChanged {
        focused: bool,
        #[serde(default)]
        url: Option<String>,
    },
    /// Popup asks for the live session record.
    GetCurrentSession,
    /// First install; seeds default settings.
    Install,
    /// Browser startup with the currently active tab, if any.
    #[serde(rename_all = "camelCase")]
    Startup {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        window_focused: bool,
    },
    /// The popup edited notes under `key`; the content script gets told
    /// whether the key still has any.
    #[serde(rename_all = "camelCase")]
    NotesChanged { key: String },
}

/// Messages the daemon sends back over the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    CurrentSession {
        #[serde(flatten)]
        session: CurrentSession,
    },
    Notification {
        id: String,
        title: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    NoteUpdated { has_note: bool },
}

/// Outbound half of the host connection. The engine owns exactly one port;
/// notification dispatch and query replies both go through it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostPort: Send {
    async fn send(&mut self, message: OutboundMessage) -> Result<()>;
}
