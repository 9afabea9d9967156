use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Kind of user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

/// A transient message for the user, e.g. a failed save.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Shared queue of pending notices. Cloning shares the queue.
#[derive(Debug, Clone, Default)]
pub struct Notices {
    queue: Arc<Mutex<Vec<Notice>>>,
    next_id: Arc<AtomicU64>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, Vec<Notice>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, kind: NoticeKind, message: impl Into<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message = message.into();
        match kind {
            NoticeKind::Error => tracing::warn!(id, %message, "Notice"),
            _ => tracing::debug!(id, %message, "Notice"),
        }
        self.queue().push(Notice {
            id,
            kind,
            message,
            created_at: Utc::now(),
        });
        id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(NoticeKind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(NoticeKind::Error, message)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(NoticeKind::Info, message)
    }

    pub fn dismiss(&self, id: u64) {
        self.queue().retain(|n| n.id != id);
    }

    /// Take every pending notice, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.queue())
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.queue().clone()
    }

    pub fn count(&self, kind: NoticeKind) -> usize {
        self.queue().iter().filter(|n| n.kind == kind).count()
    }
}
