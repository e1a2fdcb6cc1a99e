//! # Notification Dispatcher
//!
//! Renders push payloads and routes notification clicks to application
//! windows through the host's [`NotificationHost`].
//!
//! Click routing:
//! - `dismiss` does nothing
//! - `view` with a `ticketId` in the data opens `/tickets/{id}`, reusing a
//!   window already showing it, else steering an existing window there,
//!   else opening one
//! - anything else focuses an existing window, or opens one at `/`
//!
//! A new window is only opened when no window is available to reuse.

use bridge_traits::notification::{ClientWindow, NotificationAction, NotificationHost, NotificationSpec};
use core_runtime::config::NotificationDefaults;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::Result;

pub const VIEW_ACTION: &str = "view";
pub const DISMISS_ACTION: &str = "dismiss";

/// Push payload as sent by the origin; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    #[serde(default)]
    pub data: Value,
    pub actions: Option<Vec<NotificationAction>>,
    #[serde(default)]
    pub require_interaction: bool,
}

impl PushPayload {
    /// Parse a raw push body. Anything that is not a JSON object becomes the
    /// notification text.
    pub fn parse(raw: &[u8]) -> Self {
        match serde_json::from_slice::<PushPayload>(raw) {
            Ok(payload) => payload,
            Err(_) => {
                let text = String::from_utf8_lossy(raw).trim().to_string();
                Self {
                    body: (!text.is_empty()).then_some(text),
                    ..Self::default()
                }
            }
        }
    }
}

/// What a click did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Dismissed,
    Focused { window_id: String },
    Navigated { window_id: String, url: String },
    Opened { window_id: String, url: String },
}

pub fn default_actions() -> Vec<NotificationAction> {
    vec![
        NotificationAction::new(VIEW_ACTION, "View"),
        NotificationAction::new(DISMISS_ACTION, "Dismiss"),
    ]
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    host: Arc<dyn NotificationHost>,
    defaults: NotificationDefaults,
    origin: Url,
}

impl NotificationDispatcher {
    pub fn new(host: Arc<dyn NotificationHost>, defaults: NotificationDefaults, origin: Url) -> Self {
        Self {
            host,
            defaults,
            origin,
        }
    }

    pub fn render(&self, payload: PushPayload) -> NotificationSpec {
        let actions = match payload.actions {
            Some(actions) if !actions.is_empty() => actions,
            _ => default_actions(),
        };

        NotificationSpec {
            title: payload.title.unwrap_or_else(|| self.defaults.title.clone()),
            body: payload.body.unwrap_or_default(),
            icon: payload.icon.or_else(|| self.defaults.icon.clone()),
            badge: payload.badge.or_else(|| self.defaults.badge.clone()),
            tag: payload.tag,
            data: payload.data,
            actions,
            require_interaction: payload.require_interaction,
        }
    }

    #[instrument(skip(self, raw), fields(bytes = raw.len()))]
    pub async fn show(&self, raw: &[u8]) -> Result<NotificationSpec> {
        let spec = self.render(PushPayload::parse(raw));
        self.host.show_notification(spec.clone()).await?;
        info!(title = %spec.title, "Notification shown");
        Ok(spec)
    }

    #[instrument(skip(self, data))]
    pub async fn handle_click(&self, action: Option<&str>, data: &Value) -> Result<ClickOutcome> {
        if action == Some(DISMISS_ACTION) {
            debug!("Notification dismissed");
            return Ok(ClickOutcome::Dismissed);
        }

        let windows: Vec<ClientWindow> = self
            .host
            .list_windows()
            .await?
            .into_iter()
            .filter(|w| self.is_app_window(w))
            .collect();

        if action == Some(VIEW_ACTION) {
            if let Some(ticket_id) = ticket_id(data) {
                return self.open_ticket(&ticket_id, &windows).await;
            }
        }

        match preferred(&windows) {
            Some(window) => {
                self.host.focus_window(&window.id).await?;
                Ok(ClickOutcome::Focused {
                    window_id: window.id.clone(),
                })
            }
            None => self.open(self.absolute("/")).await,
        }
    }

    async fn open_ticket(&self, ticket_id: &str, windows: &[ClientWindow]) -> Result<ClickOutcome> {
        let Some(target) = self.ticket_url(ticket_id) else {
            warn!(ticket_id, "Ticket id does not form a ticket URL, opening app root");
            return self.open(self.absolute("/")).await;
        };

        if let Some(window) = windows.iter().find(|w| window_path(w) == target.path()) {
            self.host.focus_window(&window.id).await?;
            return Ok(ClickOutcome::Focused {
                window_id: window.id.clone(),
            });
        }

        let url = target.to_string();
        match preferred(windows) {
            Some(window) => {
                self.host.navigate_window(&window.id, &url).await?;
                self.host.focus_window(&window.id).await?;
                Ok(ClickOutcome::Navigated {
                    window_id: window.id.clone(),
                    url,
                })
            }
            None => self.open(url).await,
        }
    }

    async fn open(&self, url: String) -> Result<ClickOutcome> {
        let window = self.host.open_window(&url).await?;
        Ok(ClickOutcome::Opened {
            window_id: window.id,
            url,
        })
    }

    fn absolute(&self, path: &str) -> String {
        self.origin
            .join(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| path.to_string())
    }

    /// `/tickets/<id>` with the id encoded as a single path segment.
    fn ticket_url(&self, ticket_id: &str) -> Option<Url> {
        let mut url = self.origin.join("/tickets/").ok()?;
        url.path_segments_mut().ok()?.pop_if_empty().push(ticket_id);
        Some(url)
    }

    fn is_app_window(&self, window: &ClientWindow) -> bool {
        Url::parse(&window.url)
            .map(|u| u.origin() == self.origin.origin())
            .unwrap_or(false)
    }
}

/// The focused window, else the first one
fn preferred(windows: &[ClientWindow]) -> Option<&ClientWindow> {
    windows.iter().find(|w| w.focused).or_else(|| windows.first())
}

fn window_path(window: &ClientWindow) -> String {
    Url::parse(&window.url)
        .map(|u| u.path().trim_end_matches('/').to_string())
        .unwrap_or_default()
}

fn ticket_id(data: &Value) -> Option<String> {
    match data.get("ticketId")? {
        Value::String(id) if !matches!(id.as_str(), "" | "." | "..") => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
