use thiserror::Error;

/// Errors surfaced while setting up a flock or exporting its samples.
///
/// Updating a flock never fails: everything it depends on is checked by
/// [`RunOptions::validate`](crate::options::RunOptions::validate) up front.
#[derive(Debug, Error)]
pub enum FlockError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("boid index {index} out of range for a flock of {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("failed to write samples: {0}")]
    Csv(#[from] csv::Error),
}
