//! Unlocks case metadata on a regional PJe API.
//!
//! A case number is first resolved to the tribunal's internal process id
//! ([`ProcessLookup`]), then the image challenge guarding the metadata endpoint
//! is solved in a bounded loop ([`ChallengeResolver`]).

mod data;
mod effects;
mod error;

pub use data::{CaptchaAttempt, CaseResult, ChallengeOptions};
pub use effects::{ChallengeResolver, CommandSolver, ImageSolver, PjeSearch, ProcessLookup};
pub use error::{ChallengeError, Result, SolverError};
