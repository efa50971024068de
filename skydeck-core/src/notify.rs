//! Best-effort user notifications.
//!
//! A platform notifier is tried first; when it is missing or fails the
//! notice lands in a [`ToastTray`] whose entries expire on their own.

use chrono::{DateTime, Duration, Utc};
use std::{fmt::Debug, sync::Mutex};
use thiserror::Error;

pub const TOAST_LIFETIME_SECS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: Option<String>,
}

impl Notice {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), body: None }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notifications are not available")]
    Unavailable,
    #[error("Notification permission denied")]
    Denied,
    #[error("Failed to deliver notification: {0}")]
    Failed(String),
}

pub trait Notifier: Send + Sync + Debug {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub text: String,
    pub expires_at: DateTime<Utc>,
}

/// In-process fallback for notices. Toasts dismiss themselves after
/// [`TOAST_LIFETIME_SECS`].
#[derive(Debug, Default)]
pub struct ToastTray {
    toasts: Mutex<Vec<Toast>>,
}

impl ToastTray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, text: impl Into<String>, now: DateTime<Utc>) {
        let toast = Toast {
            text: text.into(),
            expires_at: now + Duration::seconds(TOAST_LIFETIME_SECS),
        };
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.push(toast);
        }
    }

    /// Toasts still visible at `now`; expired ones are dropped.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<Toast> {
        match self.toasts.lock() {
            Ok(mut toasts) => {
                toasts.retain(|t| t.expires_at > now);
                toasts.clone()
            }
            Err(_) => Vec::new(),
        }
    }

    /// Take every unexpired toast, leaving the tray empty.
    pub fn drain(&self, now: DateTime<Utc>) -> Vec<Toast> {
        match self.toasts.lock() {
            Ok(mut toasts) => toasts.drain(..).filter(|t| t.expires_at > now).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Platform notifier with a toast fallback. Never fails.
#[derive(Debug)]
pub struct FallbackNotifier {
    platform: Option<Box<dyn Notifier>>,
    tray: ToastTray,
}

impl FallbackNotifier {
    pub fn new(platform: Option<Box<dyn Notifier>>) -> Self {
        Self { platform, tray: ToastTray::new() }
    }

    pub fn tray(&self) -> &ToastTray {
        &self.tray
    }

    pub fn notify(&self, notice: &Notice) {
        if let Some(platform) = &self.platform {
            match platform.notify(notice) {
                Ok(()) => return,
                Err(err) => tracing::debug!(error = %err, "Platform notification failed, using toast"),
            }
        }

        let text = match &notice.body {
            Some(body) => format!("{}: {}", notice.title, body),
            None => notice.title.clone(),
        };
        self.tray.push(text, Utc::now());
    }
}

impl Default for FallbackNotifier {
    fn default() -> Self {
        Self::new(None)
    }
}
