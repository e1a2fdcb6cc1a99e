//! Notification and window host capability
//!
//! The core decides what to show and where to navigate; the host owns the
//! actual notification surface and application windows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A button shown on a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

impl NotificationAction {
    pub fn new(action: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            title: title.into(),
        }
    }
}

/// A fully resolved notification ready to display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSpec {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    /// Opaque data handed back on click
    pub data: serde_json::Value,
    pub actions: Vec<NotificationAction>,
    pub require_interaction: bool,
}

/// An open application window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientWindow {
    pub id: String,
    pub url: String,
    pub focused: bool,
}

/// Host notification surface and window management
#[async_trait]
pub trait NotificationHost: Send + Sync {
    /// Display a notification
    async fn show_notification(&self, spec: NotificationSpec) -> Result<()>;

    /// List open application windows
    async fn list_windows(&self) -> Result<Vec<ClientWindow>>;

    /// Bring an existing window to the foreground
    async fn focus_window(&self, id: &str) -> Result<()>;

    /// Navigate an existing window to a new location
    async fn navigate_window(&self, id: &str, url: &str) -> Result<()>;

    /// Open a new application window
    async fn open_window(&self, url: &str) -> Result<ClientWindow>;
}
