//! Error types for drill generation, grading, and the backing stores.
//!
//! Store failures are a separate enum so the service can tell "the cache is
//! down" apart from "the caller asked for something that does not exist"
//! without string matching.

use thiserror::Error;

/// Errors surfaced by the core operations.
#[derive(Debug, Error)]
pub enum DrillError {
    /// A tier name that is not `easy`, `medium` or `hard`.
    #[error("unknown tier: {0}")]
    UnknownTier(String),

    /// An operator name outside the fixed operator set.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// An operator that exists but is disabled by configuration.
    #[error("operator disabled: {0}")]
    DisabledOperator(String),

    /// A leaderboard window name that is not recognised or not active.
    #[error("unknown window: {0}")]
    UnknownWindow(String),

    /// Composition was asked to choose from no operators at all.
    #[error("operator set is empty")]
    EmptyOperatorSet,

    /// Generator or ledger configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DrillError {
    /// Returns `true` for caller mistakes that must be reported as-is and
    /// never retried.
    pub fn is_config_error(&self) -> bool {
        !matches!(self, DrillError::Store(_))
    }
}

/// Errors raised by question caches, history stores, ranked structures and
/// user directories.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer within the configured deadline.
    #[error("store call timed out after {0}ms")]
    Timeout(u64),

    /// Data read back from the store could not be decoded.
    #[error("corrupt store data: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns `true` if a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}
