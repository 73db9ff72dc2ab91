//! Per-call statement context.
//!
//! A [`QueryContext`] is passed explicitly to every statement. It carries the
//! request correlation id that instrumentation attaches to log lines, plus an
//! optional deadline and a cancellation flag that the executor honors.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    request_id: Option<String>,
    deadline: Option<Instant>,
    /// Shared between clones so any holder can cancel.
    cancelled: Arc<AtomicBool>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a correlation id for the logical request issuing the statement.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach a freshly generated correlation id.
    pub fn with_new_request_id(self) -> Self {
        self.with_request_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Mark this context (and every clone of it) as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancelled, or past its deadline.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
