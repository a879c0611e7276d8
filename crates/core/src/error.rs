//! Error types for kerfnest.
//!
//! Only input errors ever escape a nesting run. Geometry computation errors are
//! recovered inside the NFP engine, placement failures become entries in the
//! solution's unplaced list, and budget expiry is reported through
//! [`Solution::budget_limited`](crate::Solution::budget_limited).

use thiserror::Error;

/// Result type alias for kerfnest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating input or running a nesting job.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Degenerate, self-intersecting or otherwise unusable polygon.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Non-positive sheet dimensions or margins that leave no usable area.
    #[error("Invalid sheet: {0}")]
    InvalidSheet(String),

    /// Invalid constraint or solver configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Scoring weights that are negative or do not sum to 1.0.
    #[error("Invalid scoring weights: {0}")]
    InvalidWeights(String),

    /// A no-fit region computation hit a degenerate numerical case.
    #[error("NFP computation failed: {0}")]
    NfpError(String),

    /// No valid position exists for a part under the current constraints.
    #[error("No valid placement found for part: {0}")]
    NoPlacement(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any optimization begins; never recovered internally.
    Input,
    /// Recovered locally with a conservative fallback region.
    GeometryComputation,
    /// Recorded per part; the run continues.
    Placement,
    /// A bug or an invariant violation.
    Internal,
}

impl Error {
    /// Returns the taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidGeometry(_)
            | Error::InvalidSheet(_)
            | Error::ConfigError(_)
            | Error::InvalidWeights(_) => ErrorKind::Input,
            Error::NfpError(_) => ErrorKind::GeometryComputation,
            Error::NoPlacement(_) => ErrorKind::Placement,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if this error prevents a run from starting.
    pub fn is_input_error(&self) -> bool {
        self.kind() == ErrorKind::Input
    }
}
