use crossbeam_channel::Sender;

use crate::data::{EventType, ProgressEvent};

/// Publishes progress events to whoever follows the batch.
pub trait ProgressReporter: Send + Sync {
    fn emit(&self, event: &str, payload: &ProgressEvent, room: &str);
}

/// Writes events as `tracing` records under the `crawjud::progress` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn emit(&self, event: &str, payload: &ProgressEvent, room: &str) {
        macro_rules! record {
            ($level:ident) => {
                tracing::$level!(
                    target: "crawjud::progress",
                    event,
                    room,
                    row = payload.row,
                    success = payload.success,
                    errors = payload.errors,
                    remaining = payload.remaining,
                    "{}",
                    payload.message
                )
            };
        }
        match payload.kind {
            EventType::Log => record!(debug),
            EventType::Info | EventType::Success => record!(info),
            EventType::Warning => record!(warn),
            EventType::Error => record!(error),
        }
    }
}

/// An event together with its routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedEvent {
    pub event: String,
    pub room: String,
    pub payload: ProgressEvent,
}

/// Forwards events into a channel read by a relay.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: Sender<RoutedEvent>,
}

impl ChannelReporter {
    pub fn new(tx: Sender<RoutedEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressReporter for ChannelReporter {
    fn emit(&self, event: &str, payload: &ProgressEvent, room: &str) {
        let routed = RoutedEvent {
            event: event.to_string(),
            room: room.to_string(),
            payload: payload.clone(),
        };
        if self.tx.send(routed).is_err() {
            tracing::trace!(room, "progress receiver dropped");
        }
    }
}
