use thiserror::Error;

/// Errors in the configuration of a run.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BoundError {
    #[error("the number of rounds must be at least 1")]
    InvalidRounds,
    #[error("invalid bound {0}: the bound must lie between 1 and 254")]
    InvalidBound(u8),
}
