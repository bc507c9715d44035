//! SparseGraphError: unified error type for mesh-sparsity public APIs
//!
//! Every fallible operation in the crate (ownership lookup, insertion,
//! finalization, CSR export, communication) reports through this type.
//! Errors are never silently recovered: an incomplete sparsity pattern that
//! reaches a numeric solve produces wrong answers without a diagnostic.

use crate::GlobalIndex;
use thiserror::Error;

/// Unified error type for mesh-sparsity operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SparseGraphError {
    /// An index fell outside the configured global index range.
    #[error("index {index} is outside the global range [{start}, {end})")]
    OutOfRange {
        index: GlobalIndex,
        start: GlobalIndex,
        end: GlobalIndex,
    },
    /// A received exchange payload was malformed.
    #[error(
        "protocol error in payload from rank {source_rank}: {reason} (expected {expected}, got {actual})"
    )]
    ProtocolError {
        source_rank: usize,
        expected: usize,
        actual: usize,
        reason: &'static str,
    },
    /// A finalized view was requested before `finalize()` completed.
    #[error("graph is not finalized; call finalize() first")]
    NotFinalized,
    /// The graph was already finalized (mutation, or a strict repeated finalize).
    #[error("graph is already finalized")]
    AlreadyFinalized,
    /// Transport-level failure talking to a peer.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: CommFailure,
    },
    /// A peer rank reported a failure during a collective.
    #[error("rank {rank} observed a failure reported by a peer during a collective")]
    PeerFailure { rank: usize },
    /// Partition bounds are unusable (empty, decreasing, or rank count mismatch).
    #[error("invalid partition: {0}")]
    InvalidPartition(String),
    /// Two fixed-size containers disagreed on their size.
    #[error("size mismatch: expected {expected}, found {found}")]
    SizeMismatch { expected: usize, found: usize },
    /// A container failed its structural self-check.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

/// Message-carrying source for [`SparseGraphError::CommError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CommFailure(pub String);

impl From<String> for CommFailure {
    fn from(s: String) -> Self {
        CommFailure(s)
    }
}

impl From<&str> for CommFailure {
    fn from(s: &str) -> Self {
        CommFailure(s.to_owned())
    }
}

impl SparseGraphError {
    /// True for errors after which the distributed collective must be abandoned.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SparseGraphError::ProtocolError { .. }
                | SparseGraphError::CommError { .. }
                | SparseGraphError::PeerFailure { .. }
        )
    }
}
