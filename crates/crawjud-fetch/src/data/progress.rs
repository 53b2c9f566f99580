use serde::{Deserialize, Serialize};

/// Event name of every progress message of a batch.
pub const LOG_EVENT: &str = "log_execution";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Log,
    Info,
    Success,
    Warning,
    Error,
}

/// Payload published to the progress relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub message: String,
    pub pid: String,
    /// One-based position of the case in the submitted batch; zero for batch-level events.
    pub row: usize,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    pub remaining: usize,
    pub start_time: String,
}
