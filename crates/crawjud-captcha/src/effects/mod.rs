mod lookup;
mod resolver;
mod search;
mod solver;

pub use lookup::ProcessLookup;
pub use resolver::ChallengeResolver;
pub use search::PjeSearch;
pub use solver::{CommandSolver, ImageSolver};
