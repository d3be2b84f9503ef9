//! The "notify user" capability.
//!
//! Controllers report every rejection, success and failure through a
//! [`Notifier`]; how it is shown (toast, status line, log) is up to the host.
//! [`TracingNotifier`] is the default and writes notifications as `tracing`
//! events.

use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Notification {
    pub fn new(level: NoticeLevel, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: None,
        }
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Receives notifications from the controllers.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Shared handle stored by each controller.
pub type SharedNotifier = Arc<dyn Notifier>;

/// Writes notifications as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        let description = n.description.as_deref().unwrap_or("");
        match n.level {
            NoticeLevel::Success | NoticeLevel::Info => info!("{} {}", n.title, description),
            NoticeLevel::Warning => warn!("{} {}", n.title, description),
            NoticeLevel::Error => error!("{} {}", n.title, description),
        }
    }
}

/// Keeps every notification in memory. Useful for tests and for hosts that
/// render notifications in batches.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Most recent notification.
    pub fn last(&self) -> Option<Notification> {
        self.seen.lock().ok().and_then(|v| v.last().cloned())
    }

    /// Remove and return everything received so far.
    pub fn drain(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .map(|mut v| std::mem::take(&mut *v))
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(notification);
        }
    }
}
