//! Transient, auto-expiring user notifications.
//!
//! Fire-and-forget: `notify` never blocks and returns only an id usable for
//! manual dismissal. The number of live notifications is bounded; when the
//! bound is exceeded the oldest one is evicted (FIFO).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A notification currently shown to the user.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    /// `None` means it persists until dismissed.
    pub expires_at: Option<Instant>,
}

impl Notification {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Where notifications are rendered.
pub trait NotificationSink: Send + Sync {
    /// A notification became visible.
    fn show(&self, notification: &Notification);

    /// A notification was dismissed, evicted or expired.
    fn hide(&self, _id: u64) {}
}

/// Sink that writes notifications to stderr.
#[derive(Debug, Default)]
pub struct StderrSink;

impl NotificationSink for StderrSink {
    fn show(&self, n: &Notification) {
        let marker = match n.severity {
            Severity::Info => "[i]",
            Severity::Success => "[ok]",
            Severity::Warning => "[!]",
            Severity::Error => "[x]",
        };
        eprintln!("{marker} {}", n.message);
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    live: VecDeque<Notification>,
}

/// Bounded notification surface. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct NotificationChannel {
    inner: Arc<Mutex<Inner>>,
    sink: Arc<dyn NotificationSink>,
    max_visible: usize,
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("max_visible", &self.max_visible)
            .finish_non_exhaustive()
    }
}

impl NotificationChannel {
    /// Create a channel rendering into `sink`, keeping at most `max_visible`.
    pub fn new(sink: Arc<dyn NotificationSink>, max_visible: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            sink,
            max_visible: max_visible.max(1),
        }
    }

    /// Show a message. `duration_ms == 0` persists until dismissed.
    pub fn notify(&self, message: impl Into<String>, severity: Severity, duration_ms: u64) -> u64 {
        let message = message.into();
        match severity {
            Severity::Error => error!(%severity, "{message}"),
            Severity::Warning => warn!(%severity, "{message}"),
            Severity::Info | Severity::Success => info!(%severity, "{message}"),
        }

        let now = Instant::now();
        let mut evicted = Vec::new();
        let notification = {
            let mut inner = self.lock();
            prune_expired(&mut inner, now, &mut evicted);

            inner.next_id += 1;
            let notification = Notification {
                id: inner.next_id,
                message,
                severity,
                expires_at: (duration_ms > 0).then(|| now + Duration::from_millis(duration_ms)),
            };
            inner.live.push_back(notification.clone());
            while inner.live.len() > self.max_visible {
                if let Some(oldest) = inner.live.pop_front() {
                    evicted.push(oldest.id);
                }
            }
            notification
        };

        for id in evicted {
            self.sink.hide(id);
        }
        self.sink.show(&notification);
        notification.id
    }

    /// Dismiss a notification manually. Unknown ids are ignored.
    pub fn dismiss(&self, id: u64) {
        let removed = {
            let mut inner = self.lock();
            let before = inner.live.len();
            inner.live.retain(|n| n.id != id);
            before != inner.live.len()
        };
        if removed {
            self.sink.hide(id);
        }
    }

    /// Notifications that are still live, oldest first.
    pub fn visible(&self) -> Vec<Notification> {
        let mut evicted = Vec::new();
        let live = {
            let mut inner = self.lock();
            prune_expired(&mut inner, Instant::now(), &mut evicted);
            inner.live.iter().cloned().collect()
        };
        for id in evicted {
            self.sink.hide(id);
        }
        live
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn prune_expired(inner: &mut Inner, now: Instant, evicted: &mut Vec<u64>) {
    inner.live.retain(|n| {
        let expired = n.is_expired(now);
        if expired {
            evicted.push(n.id);
        }
        !expired
    });
}
