use crawjud_cnj::RegionCode;
use crawjud_session::ApiClient;

use crate::data::{CaseResult, ChallengeOptions};
use crate::effects::lookup::ProcessLookup;
use crate::effects::resolver::ChallengeResolver;
use crate::effects::solver::ImageSolver;
use crate::error::Result;

/// Lookup followed by challenge resolution: case number in, unlocked metadata out.
pub struct PjeSearch<S> {
    lookup: ProcessLookup,
    resolver: ChallengeResolver<S>,
}

impl<S: ImageSolver> PjeSearch<S> {
    pub fn new(solver: S, options: ChallengeOptions) -> Self {
        Self {
            lookup: ProcessLookup::new(options.request_timeout()),
            resolver: ChallengeResolver::new(solver, options),
        }
    }

    pub fn search(&self, client: &dyn ApiClient, region: &RegionCode, case_number: &str) -> Result<CaseResult> {
        let process_id = self.lookup.process_id(client, case_number)?;
        tracing::debug!(case = case_number, process_id = %process_id, "process found");
        self.resolver.resolve(client, region, case_number, &process_id)
    }
}
