use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Local;

use crate::data::{EventType, ProgressEvent};

/// Batch counters shared by every worker.
#[derive(Debug)]
pub struct ProgressTracker {
    pid: String,
    total: usize,
    success: AtomicUsize,
    errors: AtomicUsize,
    remaining: AtomicUsize,
    start_time: String,
}

impl ProgressTracker {
    pub fn new(pid: impl Into<String>, total: usize) -> Self {
        Self {
            pid: pid.into(),
            total,
            success: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            remaining: AtomicUsize::new(total),
            start_time: Local::now().format("%d/%m/%Y %H:%M:%S").to_string(),
        }
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::SeqCst);
        self.finish_one();
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.finish_one();
    }

    /// Snapshot of the counters wrapped around `message`.
    pub fn event(&self, row: usize, kind: EventType, message: impl Into<String>) -> ProgressEvent {
        ProgressEvent {
            message: message.into(),
            pid: self.pid.clone(),
            row,
            kind,
            total: self.total,
            success: self.success.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
            remaining: self.remaining.load(Ordering::SeqCst),
            start_time: self.start_time.clone(),
        }
    }

    fn finish_one(&self) {
        let _ = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(1));
    }
}
