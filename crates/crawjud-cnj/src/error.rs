use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CnjError {
    #[error("`{0}` does not match the NNNNNNN-DD.AAAA.J.TR.OOOO pattern")]
    Malformed(String),

    #[error("`{number}` belongs to judicial branch {branch}, expected 5")]
    UnsupportedBranch { number: String, branch: char },

    #[error("`{0}` carries an empty tribunal region")]
    InvalidRegion(String),
}

pub type Result<T> = std::result::Result<T, CnjError>;
