use chrono::{DateTime, Utc};
use crawjud_cnj::RegionCode;
use serde::Serialize;

use crate::error::ErrorKind;

/// Object key of a case's full-text document.
pub fn destination_key(pid: &str, case_number: &str) -> String {
    format!("{}/COPIA INTEGRAL {case_number} {pid}.pdf", pid.to_uppercase())
}

/// Terminal result of one case.
///
/// `succeeded` means the metadata was unlocked and, if the tribunal had a
/// document, it was stored in full. A case with metadata but no document is
/// a success carrying [`ErrorKind::DocumentUnavailable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    pub case_number: String,
    pub original_index: usize,
    pub region_code: Option<RegionCode>,
    pub destination_key: String,
    pub bytes_written: u64,
    pub succeeded: bool,
    pub error_kind: Option<ErrorKind>,
    pub metadata_cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DownloadOutcome {
    pub fn new(pid: &str, case_number: &str, original_index: usize, region_code: Option<RegionCode>) -> Self {
        Self {
            case_number: case_number.to_string(),
            original_index,
            region_code,
            destination_key: destination_key(pid, case_number),
            bytes_written: 0,
            succeeded: false,
            error_kind: None,
            metadata_cached: false,
            message: None,
        }
    }

    #[must_use]
    pub fn failed(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.succeeded = false;
        self.error_kind = Some(kind);
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn stored(mut self, bytes: u64) -> Self {
        self.succeeded = true;
        self.error_kind = None;
        self.bytes_written = bytes;
        self
    }

    #[must_use]
    pub fn metadata_only(mut self, message: impl Into<String>) -> Self {
        self.succeeded = true;
        self.error_kind = Some(ErrorKind::DocumentUnavailable);
        self.message = Some(message.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded && self.error_kind.is_none()
    }

    pub fn is_metadata_only(&self) -> bool {
        self.succeeded && self.error_kind == Some(ErrorKind::DocumentUnavailable)
    }
}

/// Everything a batch produced, one outcome per accepted case.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub pid: String,
    pub submitted: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Sorted by the case's position in the submitted batch.
    pub outcomes: Vec<DownloadOutcome>,
    pub peak_regions: usize,
    pub peak_cases: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn outcome(&self, case_number: &str) -> Option<&DownloadOutcome> {
        self.outcomes.iter().find(|o| o.case_number == case_number)
    }

    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_complete()).count()
    }

    pub fn metadata_only(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_metadata_only()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded).count()
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.outcomes.iter().filter(|o| o.error_kind == Some(kind)).count()
    }
}
