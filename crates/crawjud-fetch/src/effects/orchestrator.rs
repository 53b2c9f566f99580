use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use chrono::Utc;
use crawjud_captcha::CaseResult;
use crawjud_cnj::{CaseRecord, RegionBatch, RegionCode, partition};
use crawjud_session::ApiClient;
use crawjud_storage::{CachedCase, MetadataCache};

use crate::core::{ProgressTracker, Semaphore, StopFlag};
use crate::data::{BatchReport, DownloadOutcome, EventType, LOG_EVENT, PoolOptions};
use crate::effects::bot::Bot;
use crate::effects::capability::Document;
use crate::effects::reporter::ProgressReporter;
use crate::error::{DocumentError, ErrorKind};

/// Runs a batch through the region pool, the per-region case pools and one
/// document-fetch thread per unlocked case.
///
/// All workers are scoped OS threads. Permits are taken in submission order by
/// the dispatching thread, so a region's cases start in batch order. A case's
/// metadata is cached before its document fetch begins. Errors end the case
/// or region they belong to and never the batch; a panicking worker is
/// contained the same way and reported as [`ErrorKind::Unexpected`].
pub struct Orchestrator {
    bot: Bot,
    cache: Arc<dyn MetadataCache>,
    reporter: Arc<dyn ProgressReporter>,
    options: PoolOptions,
    stop: StopFlag,
}

/// State shared by every worker of one run.
struct Run<'a> {
    pid: &'a str,
    tracker: ProgressTracker,
    outcomes: Mutex<Vec<DownloadOutcome>>,
    peak_cases: AtomicUsize,
}

impl Run<'_> {
    fn push(&self, outcome: DownloadOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }

    fn outcome_for(&self, record: &CaseRecord) -> DownloadOutcome {
        DownloadOutcome::new(
            self.pid,
            &record.case_number,
            record.original_index,
            record.region_code.clone(),
        )
    }
}

impl Orchestrator {
    pub fn new(
        bot: Bot,
        cache: Arc<dyn MetadataCache>,
        reporter: Arc<dyn ProgressReporter>,
        options: PoolOptions,
    ) -> Self {
        Self {
            bot,
            cache,
            reporter,
            options,
            stop: StopFlag::new(),
        }
    }

    #[must_use]
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Handle for stopping the batch from another thread.
    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    pub fn run(&self, pid: &str, records: impl IntoIterator<Item = CaseRecord>) -> BatchReport {
        let started_at = Utc::now();
        let records: Vec<CaseRecord> = records.into_iter().collect();
        let submitted = records.len();
        let split = partition(records);

        let run = Run {
            pid,
            tracker: ProgressTracker::new(pid, split.accepted()),
            outcomes: Mutex::new(Vec::with_capacity(split.accepted())),
            peak_cases: AtomicUsize::new(0),
        };

        tracing::info!(
            pid,
            submitted,
            accepted = split.accepted(),
            rejected = split.rejected,
            regions = split.regions.len(),
            "batch started"
        );
        self.emit(
            &run,
            0,
            EventType::Log,
            format!(
                "Starting batch: {} cases in {} regions ({} rejected)",
                split.accepted(),
                split.regions.len(),
                split.rejected
            ),
        );

        let region_gate = Semaphore::new(self.options.regions);
        thread::scope(|s| {
            for region in split.regions.values() {
                if self.stop.is_stopped() {
                    self.cancel(&run, &region.records);
                    continue;
                }
                let permit = region_gate.acquire();
                if self.stop.is_stopped() {
                    drop(permit);
                    self.cancel(&run, &region.records);
                    continue;
                }

                let run = &run;
                s.spawn(move || {
                    let _permit = permit;
                    if let Err(reason) = contain(|| self.run_region(run, region)) {
                        tracing::error!(region = %region.region_code, %reason, "region worker panicked");
                        self.abandon(run, &region.records, &reason);
                    }
                });
            }
        });

        let cancelled = self.stop.is_stopped();
        let event = run.tracker.event(
            0,
            EventType::Info,
            if cancelled { "Batch stopped" } else { "Batch finished" },
        );
        self.reporter.emit(LOG_EVENT, &event, pid);
        tracing::info!(pid, success = event.success, errors = event.errors, cancelled, "batch finished");

        let mut outcomes = run.outcomes.into_inner().unwrap_or_else(PoisonError::into_inner);
        outcomes.sort_by_key(|o| o.original_index);

        BatchReport {
            pid: pid.to_string(),
            submitted,
            accepted: split.accepted(),
            rejected: split.rejected,
            outcomes,
            peak_regions: region_gate.peak(),
            peak_cases: run.peak_cases.into_inner(),
            cancelled,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn run_region(&self, run: &Run<'_>, region: &RegionBatch) {
        let code = &region.region_code;
        self.emit(run, 0, EventType::Log, format!("Authenticating TRT{code}"));

        let connected = self
            .bot
            .authenticator
            .authenticate(code)
            .map_err(|e| e.to_string())
            .and_then(|session| self.bot.connector.connect(&session).map_err(|e| e.to_string()));

        let client = match connected {
            Ok(client) => client,
            Err(reason) => {
                tracing::error!(region = %code, error = %reason, "region skipped");
                for record in &region.records {
                    run.tracker.record_error();
                    self.emit(
                        run,
                        row(record),
                        EventType::Error,
                        format!("Authentication for TRT{code} failed: {reason}"),
                    );
                    run.push(run.outcome_for(record).failed(ErrorKind::AuthFailure, reason.clone()));
                }
                return;
            }
        };
        self.emit(run, 0, EventType::Info, format!("TRT{code} authenticated"));

        let client: &dyn ApiClient = &*client;
        let case_gate = Semaphore::new(self.options.cases_per_region);
        thread::scope(|s| {
            for record in &region.records {
                if self.stop.is_stopped() {
                    self.cancel(run, std::slice::from_ref(record));
                    continue;
                }
                let permit = case_gate.acquire();
                if self.stop.is_stopped() {
                    drop(permit);
                    self.cancel(run, std::slice::from_ref(record));
                    continue;
                }

                s.spawn(move || {
                    let unlocked = {
                        let _permit = permit;
                        contain(|| self.unlock(run, client, code, record))
                    };
                    match unlocked {
                        Ok(Some((result, cached))) => {
                            s.spawn(move || {
                                if let Err(reason) = contain(|| self.fetch_document(run, client, record, result, cached)) {
                                    self.abandon(run, std::slice::from_ref(record), &reason);
                                }
                            });
                        }
                        Ok(None) => {}
                        Err(reason) => self.abandon(run, std::slice::from_ref(record), &reason),
                    }
                });
            }
        });

        run.peak_cases.fetch_max(case_gate.peak(), Ordering::SeqCst);
        tracing::debug!(region = %code, peak_cases = case_gate.peak(), "region finished");
    }

    /// Lookup, challenge and write-through cache of one case.
    fn unlock(
        &self,
        run: &Run<'_>,
        client: &dyn ApiClient,
        region: &RegionCode,
        record: &CaseRecord,
    ) -> Option<(CaseResult, bool)> {
        let row = row(record);
        self.emit(run, row, EventType::Log, format!("Searching case {}", record.case_number));

        match self.bot.searcher.search(client, region, &record.case_number) {
            Ok(result) => {
                let cached = self.cache_metadata(run, row, &result);
                Some((result, cached))
            }
            Err(e) => {
                tracing::warn!(case = %record.case_number, error = %e, "case failed");
                run.tracker.record_error();
                self.emit(run, row, EventType::Error, e.to_string());
                run.push(run.outcome_for(record).failed(ErrorKind::from(&e), e.to_string()));
                None
            }
        }
    }

    fn cache_metadata(&self, run: &Run<'_>, row: usize, result: &CaseResult) -> bool {
        let entry = CachedCase {
            case_number: result.case_number.clone(),
            pid: run.pid.to_string(),
            data: result.raw_metadata.clone(),
        };
        match self.cache.save(&entry) {
            Ok(()) => {
                self.emit(
                    run,
                    row,
                    EventType::Success,
                    format!("Case {} found, metadata saved", result.case_number),
                );
                true
            }
            Err(e) => {
                tracing::warn!(case = %result.case_number, error = %e, "metadata cache write failed");
                self.emit(
                    run,
                    row,
                    EventType::Warning,
                    format!("Case {} found but its metadata could not be cached: {e}", result.case_number),
                );
                false
            }
        }
    }

    fn fetch_document(
        &self,
        run: &Run<'_>,
        client: &dyn ApiClient,
        record: &CaseRecord,
        result: CaseResult,
        cached: bool,
    ) {
        let row = row(record);
        let mut outcome = run.outcome_for(record);
        outcome.metadata_cached = cached;
        self.emit(run, row, EventType::Log, format!("Downloading full text of {}", record.case_number));

        let outcome = match self.bot.downloader.download(client, &result, &outcome.destination_key) {
            Ok(Document::Stored(report)) => {
                run.tracker.record_success();
                self.emit(
                    run,
                    row,
                    EventType::Info,
                    format!("Full text of {} stored ({} bytes)", record.case_number, report.bytes_written),
                );
                outcome.stored(report.bytes_written)
            }
            Ok(Document::Unavailable { content_type }) => {
                run.tracker.record_success();
                let message = format!(
                    "No full text available for {} ({})",
                    record.case_number,
                    content_type.as_deref().unwrap_or("no content type")
                );
                self.emit(run, row, EventType::Info, message.clone());
                outcome.metadata_only(message)
            }
            Err(e @ DocumentError::Fetch(_)) => {
                run.tracker.record_success();
                tracing::warn!(case = %record.case_number, error = %e, "document fetch failed");
                self.emit(run, row, EventType::Warning, format!("Could not download the file: {e}"));
                outcome.metadata_only(e.to_string())
            }
            Err(e) => {
                run.tracker.record_error();
                tracing::error!(case = %record.case_number, error = %e, "document storage failed");
                self.emit(run, row, EventType::Error, e.to_string());
                outcome.failed(e.kind(), e.to_string())
            }
        };
        run.push(outcome);
    }

    fn cancel(&self, run: &Run<'_>, records: &[CaseRecord]) {
        for record in records {
            tracing::debug!(case = %record.case_number, "not started, batch stopped");
            run.tracker.record_error();
            self.emit(
                run,
                row(record),
                EventType::Warning,
                format!("Case {} not started, batch stopped", record.case_number),
            );
            run.push(
                run.outcome_for(record)
                    .failed(ErrorKind::Cancelled, "batch stopped before the case started"),
            );
        }
    }

    /// Fails every record in `records` that has no outcome yet.
    fn abandon(&self, run: &Run<'_>, records: &[CaseRecord], reason: &str) {
        let missing: Vec<&CaseRecord> = {
            let outcomes = run.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
            records
                .iter()
                .filter(|r| !outcomes.iter().any(|o| o.original_index == r.original_index))
                .collect()
        };

        for record in missing {
            tracing::error!(case = %record.case_number, %reason, "case abandoned");
            let message = format!("Unexpected error: {reason}");
            run.tracker.record_error();
            self.emit(run, row(record), EventType::Error, message.clone());
            run.push(run.outcome_for(record).failed(ErrorKind::Unexpected, message));
        }
    }

    fn emit(&self, run: &Run<'_>, row: usize, kind: EventType, message: impl Into<String>) {
        let event = run.tracker.event(row, kind, message);
        self.reporter.emit(LOG_EVENT, &event, run.pid);
    }
}

fn row(record: &CaseRecord) -> usize {
    record.original_index + 1
}

/// Runs a worker body, turning a panic into its message.
fn contain<T>(work: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "worker panicked".to_string())
    })
}
