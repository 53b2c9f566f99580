use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative batch cancellation, checked before each region and each case.
///
/// Work already started is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
