use std::time::Duration;

use crawjud_captcha::{CaseResult, ChallengeError, ImageSolver, PjeSearch};
use crawjud_cnj::RegionCode;
use crawjud_session::ApiClient;
use crawjud_storage::{StreamingWriter, WriteReport};

use crate::error::DocumentError;

const PDF: &str = "application/pdf";

/// Finds a case and unlocks its metadata.
pub trait Searcher: Send + Sync {
    fn search(&self, client: &dyn ApiClient, region: &RegionCode, case_number: &str)
    -> Result<CaseResult, ChallengeError>;
}

impl<S: ImageSolver> Searcher for PjeSearch<S> {
    fn search(
        &self,
        client: &dyn ApiClient,
        region: &RegionCode,
        case_number: &str,
    ) -> Result<CaseResult, ChallengeError> {
        PjeSearch::search(self, client, region, case_number)
    }
}

/// Result of the document-fetch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    Stored(WriteReport),
    /// The tribunal answered with something other than a PDF.
    Unavailable { content_type: Option<String> },
}

/// Fetches an unlocked case's full-text document into storage.
pub trait Downloader: Send + Sync {
    fn download(&self, client: &dyn ApiClient, case: &CaseResult, key: &str) -> Result<Document, DocumentError>;
}

/// `GET /processos/<id>/integra?tokenCaptcha=<token>` streamed through a
/// [`StreamingWriter`].
pub struct PjeDownloader {
    writer: StreamingWriter,
    timeout: Duration,
}

impl PjeDownloader {
    pub fn new(writer: StreamingWriter, timeout: Duration) -> Self {
        Self { writer, timeout }
    }
}

impl Downloader for PjeDownloader {
    fn download(&self, client: &dyn ApiClient, case: &CaseResult, key: &str) -> Result<Document, DocumentError> {
        let path = format!(
            "/processos/{}/integra?tokenCaptcha={}",
            case.process_internal_id,
            urlencoding::encode(&case.access_token)
        );
        let response = client.get(&path, Some(self.timeout))?;

        if !is_pdf(response.content_type()) {
            let content_type = response.content_type().map(str::to_string);
            tracing::info!(case = %case.case_number, content_type = ?content_type, "no document available");
            return Ok(Document::Unavailable { content_type });
        }

        let declared = response.content_length();
        let mut body = response.into_body();
        let report = self.writer.write(key, &mut *body, declared)?;
        Ok(Document::Stored(report))
    }
}

fn is_pdf(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(PDF))
}
